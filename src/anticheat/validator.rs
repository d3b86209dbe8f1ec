use smallvec::SmallVec;

use crate::anticheat::signals::{AbilityCheck, CheatSignal, CheatViolation};
use crate::game::ability::{AbilityRules, TargetingType};
use crate::game::constants::ability::{COOLDOWN_TOLERANCE, COST_TOLERANCE, RANGE_TOLERANCE};
use crate::game::EntityId;
use crate::util::vec3::Vec3;

/// Tolerances applied on top of each ability rule
#[derive(Debug, Clone)]
pub struct AbilityTolerances {
    /// Minimum accepted range differential (negative = out of range)
    pub range: f32,
    /// Maximum accepted remaining cooldown in seconds
    pub cooldown: f32,
    /// Maximum accepted mana shortfall
    pub cost: f32,
}

impl Default for AbilityTolerances {
    fn default() -> Self {
        Self {
            range: RANGE_TOLERANCE,
            cooldown: COOLDOWN_TOLERANCE,
            cost: COST_TOLERANCE,
        }
    }
}

/// A remote cast as claimed by the caster
#[derive(Debug, Clone, PartialEq)]
pub struct CastClaim {
    pub target_point: Vec3,
    pub target_entity: Option<EntityId>,
}

impl CastClaim {
    pub fn at_point(target_point: Vec3) -> Self {
        Self {
            target_point,
            target_entity: None,
        }
    }

    pub fn at_unit(target_point: Vec3, target: EntityId) -> Self {
        Self {
            target_point,
            target_entity: Some(target),
        }
    }
}

/// Per-check outcome of one validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbilityVerdict {
    pub ability_id: u32,
    pub targeting: bool,
    pub cooldown: bool,
    pub cost: bool,
}

impl AbilityVerdict {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        self.targeting && self.cooldown && self.cost
    }

    /// Every check that failed beyond its tolerance
    pub fn failures(&self) -> SmallVec<[AbilityCheck; 3]> {
        let mut failed = SmallVec::new();
        if !self.targeting {
            failed.push(AbilityCheck::Targeting);
        }
        if !self.cooldown {
            failed.push(AbilityCheck::Cooldown);
        }
        if !self.cost {
            failed.push(AbilityCheck::Cost);
        }
        failed
    }

    /// Cheat signal against `caster` if the claim was rejected
    pub fn into_signal(self, caster: EntityId) -> Option<CheatSignal> {
        if self.is_accepted() {
            return None;
        }
        Some(CheatSignal::new(
            caster,
            CheatViolation::Ability {
                ability_id: self.ability_id,
                failed: self.failures(),
            },
        ))
    }
}

/// Stateless ability-use validator
#[derive(Debug, Clone, Default)]
pub struct AbilityValidator {
    tolerances: AbilityTolerances,
}

impl AbilityValidator {
    pub fn new(tolerances: AbilityTolerances) -> Self {
        Self { tolerances }
    }

    /// Run all three checks; none is skipped when an earlier one fails
    ///
    /// `caster_mana` is the caster's authoritative mana mirror, never a
    /// value taken from the claim.
    pub fn validate<A: AbilityRules + ?Sized>(
        &self,
        ability: &A,
        claim: &CastClaim,
        caster_mana: f32,
    ) -> AbilityVerdict {
        AbilityVerdict {
            ability_id: ability.id(),
            targeting: self.check_targeting(ability, claim),
            cooldown: self.check_cooldown(ability),
            cost: self.check_cost(ability, caster_mana),
        }
    }

    fn check_targeting<A: AbilityRules + ?Sized>(&self, ability: &A, claim: &CastClaim) -> bool {
        if !ability.needs_targeting() {
            return true;
        }

        let range = ability.validate_target_position(claim.target_point);
        let valid_range = range.valid || range.differential >= self.tolerances.range;

        // Team affiliation does not drift: no tolerance
        let valid_target = match ability.targeting_type() {
            TargetingType::Unit => claim
                .target_entity
                .is_some_and(|target| ability.validate_target_team(target)),
            TargetingType::Point => true,
        };

        valid_range && valid_target
    }

    fn check_cooldown<A: AbilityRules + ?Sized>(&self, ability: &A) -> bool {
        if !ability.is_on_cooldown() {
            return true;
        }
        let full = ability.full_cooldown();
        full - ability.cooldown_remaining() + self.tolerances.cooldown >= full
    }

    fn check_cost<A: AbilityRules + ?Sized>(&self, ability: &A, caster_mana: f32) -> bool {
        ability.has_sufficient_cost(caster_mana)
            || caster_mana + self.tolerances.cost >= ability.required_mana_cost()
    }

    pub fn tolerances(&self) -> &AbilityTolerances {
        &self.tolerances
    }
}
