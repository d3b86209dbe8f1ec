//! Ability rule collaborators
//!
//! Rule definitions own their range and team logic; the validator only
//! widens the outcome by its tolerances.

use serde::{Deserialize, Serialize};

use crate::game::EntityId;
use crate::util::vec3::Vec3;

/// How an ability selects its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetingType {
    /// Ground-targeted at a point
    Point,
    /// Targeted at a specific entity
    Unit,
}

/// Result of an ability's own range predicate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeCheck {
    pub valid: bool,
    /// `range - distance`; negative when the target is out of range
    pub differential: f32,
}

/// Ability rules; caster resources are supplied by the caller
pub trait AbilityRules {
    fn id(&self) -> u32;
    fn needs_targeting(&self) -> bool;
    fn targeting_type(&self) -> TargetingType;
    fn validate_target_position(&self, point: Vec3) -> RangeCheck;
    /// Friend/enemy legality of a unit target
    fn validate_target_team(&self, target: EntityId) -> bool;
    fn is_on_cooldown(&self) -> bool;
    fn cooldown_remaining(&self) -> f32;
    fn full_cooldown(&self) -> f32;
    /// Whether `mana` covers the cost without any tolerance
    fn has_sufficient_cost(&self, mana: f32) -> bool;
    fn required_mana_cost(&self) -> f32;
}

/// Plain-data ability state, as captured from the authoritative simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedAbility {
    pub id: u32,
    /// `None` for self-cast / untargeted abilities
    #[serde(default)]
    pub targeting: Option<TargetingType>,
    #[serde(default)]
    pub range: f32,
    #[serde(default)]
    pub caster_position: Vec3,
    /// Entities this caster may legally target with a unit ability
    #[serde(default)]
    pub legal_targets: Vec<EntityId>,
    #[serde(default)]
    pub cooldown: f32,
    #[serde(default)]
    pub cooldown_remaining: f32,
    #[serde(default)]
    pub mana_cost: f32,
}

impl ScriptedAbility {
    /// Untargeted, off cooldown, free
    pub fn instant(id: u32) -> Self {
        Self {
            id,
            targeting: None,
            range: 0.0,
            caster_position: Vec3::ZERO,
            legal_targets: Vec::new(),
            cooldown: 0.0,
            cooldown_remaining: 0.0,
            mana_cost: 0.0,
        }
    }

    pub fn targeted(id: u32, targeting: TargetingType, range: f32, caster_position: Vec3) -> Self {
        Self {
            targeting: Some(targeting),
            range,
            caster_position,
            ..Self::instant(id)
        }
    }
}

impl AbilityRules for ScriptedAbility {
    fn id(&self) -> u32 {
        self.id
    }

    fn needs_targeting(&self) -> bool {
        self.targeting.is_some()
    }

    fn targeting_type(&self) -> TargetingType {
        self.targeting.unwrap_or(TargetingType::Point)
    }

    fn validate_target_position(&self, point: Vec3) -> RangeCheck {
        let distance = self.caster_position.distance_to(point);
        RangeCheck {
            valid: distance <= self.range,
            differential: self.range - distance,
        }
    }

    fn validate_target_team(&self, target: EntityId) -> bool {
        self.legal_targets.contains(&target)
    }

    fn is_on_cooldown(&self) -> bool {
        self.cooldown_remaining > 0.0
    }

    fn cooldown_remaining(&self) -> f32 {
        self.cooldown_remaining
    }

    fn full_cooldown(&self) -> f32 {
        self.cooldown
    }

    fn has_sufficient_cost(&self, mana: f32) -> bool {
        mana >= self.mana_cost
    }

    fn required_mana_cost(&self) -> f32 {
        self.mana_cost
    }
}
