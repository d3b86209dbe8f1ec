//! Registry of reconciled remote entities
//!
//! One [`Reconciler`] per remote entity. The local player is never
//! registered, so nothing here ever checks it.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use hashbrown::HashMap;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::anticheat::movement::{MovementConfig, MovementVerdict};
use crate::anticheat::signals::{CheatSignal, SignalBusError, SignalSender};
use crate::anticheat::validator::{AbilityValidator, CastClaim};
use crate::config::GuardConfig;
use crate::game::ability::AbilityRules;
use crate::game::character::CharacterMotor;
use crate::game::EntityId;
use crate::metrics::Metrics;
use crate::net::reconciler::{ReconcileConfig, Reconciler, Snapshot, SnapshotOutcome};
use crate::util::vec3::Vec3;

/// Below this many entities the tick runs inline
#[cfg(feature = "parallel")]
const PARALLEL_TICK_THRESHOLD: usize = 64;

pub struct RemoteEntities<M: CharacterMotor> {
    entities: HashMap<EntityId, Reconciler<M>>,
    validator: AbilityValidator,
    reconcile: ReconcileConfig,
    movement: MovementConfig,
    signals: SignalSender,
    metrics: Arc<Metrics>,
}

impl<M: CharacterMotor + Send> RemoteEntities<M> {
    pub fn new(config: &GuardConfig, signals: SignalSender, metrics: Arc<Metrics>) -> Self {
        Self {
            entities: HashMap::new(),
            validator: AbilityValidator::new(config.ability.clone()),
            reconcile: config.reconcile.clone(),
            movement: config.movement.clone(),
            signals,
            metrics,
        }
    }

    /// Start tracking a remote entity at `position`
    pub fn join(&mut self, entity: EntityId, motor: M, position: Vec3) {
        let reconciler = Reconciler::new(
            entity,
            motor,
            position,
            self.reconcile.clone(),
            self.movement.clone(),
        );
        if self.entities.insert(entity, reconciler).is_some() {
            warn!(%entity, "Entity re-joined, previous tracking state discarded");
        } else {
            info!(%entity, "Tracking remote entity");
        }
        self.update_tracked_gauge();
    }

    /// Stop tracking; any in-flight detection state is discarded
    pub fn leave(&mut self, entity: EntityId) -> bool {
        match self.entities.remove(&entity) {
            Some(mut reconciler) => {
                reconciler.disable();
                info!(%entity, "Remote entity left");
                self.update_tracked_gauge();
                true
            }
            None => false,
        }
    }

    pub fn teleport(&mut self, entity: EntityId, position: Vec3) -> bool {
        match self.entities.get_mut(&entity) {
            Some(reconciler) => {
                reconciler.teleport(position);
                true
            }
            None => {
                debug!(%entity, "Teleport for untracked entity ignored");
                false
            }
        }
    }

    /// Apply a snapshot; `None` if the entity is not tracked
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot, local_time: f64) -> Option<SnapshotOutcome> {
        let Some(reconciler) = self.entities.get_mut(&snapshot.entity) else {
            debug!(entity = %snapshot.entity, "Snapshot for untracked entity ignored");
            return None;
        };

        let outcome = reconciler.apply_snapshot(snapshot, local_time);
        match &outcome {
            SnapshotOutcome::Applied { movement } => {
                Metrics::incr(&self.metrics.snapshots_applied);
                match movement {
                    MovementVerdict::Skipped(_) => Metrics::incr(&self.metrics.samples_skipped),
                    MovementVerdict::Violation(signal) => {
                        Metrics::incr(&self.metrics.movement_violations);
                        self.publish(signal.clone());
                    }
                    _ => {}
                }
            }
            SnapshotOutcome::Dropped(_) => Metrics::incr(&self.metrics.snapshots_dropped),
        }
        Some(outcome)
    }

    /// Validate a cast claimed by a tracked remote entity
    ///
    /// The cost check reads the caster's snapshot-fed mana mirror. Returns
    /// whether the cast is accepted. Casts by untracked entities (including
    /// the local player) are not checked and are accepted.
    pub fn observe_cast<A: AbilityRules + ?Sized>(
        &mut self,
        caster: EntityId,
        ability: &A,
        claim: &CastClaim,
    ) -> bool {
        let Some(reconciler) = self.entities.get(&caster) else {
            debug!(%caster, "Cast by untracked entity not checked");
            return true;
        };
        let mana = reconciler.motor().mana();

        Metrics::incr(&self.metrics.casts_validated);
        let verdict = self.validator.validate(ability, claim, mana);
        let accepted = verdict.is_accepted();

        if let Some(signal) = verdict.into_signal(caster) {
            Metrics::incr(&self.metrics.casts_rejected);
            warn!(%caster, ability = ability.id(), failed = ?verdict.failures(), "Ability use rejected");
            self.publish(signal);
        }
        accepted
    }

    /// Advance every tracked entity by one render tick
    pub fn tick_all(&mut self, dt: f32) {
        let start = Instant::now();

        #[cfg(feature = "parallel")]
        {
            if self.entities.len() >= PARALLEL_TICK_THRESHOLD {
                self.entities.par_values_mut().for_each(|r| r.tick(dt));
            } else {
                self.entities.values_mut().for_each(|r| r.tick(dt));
            }
        }
        #[cfg(not(feature = "parallel"))]
        self.entities.values_mut().for_each(|r| r.tick(dt));

        self.metrics.record_tick_time(start.elapsed());
    }

    fn publish(&self, signal: CheatSignal) {
        match self.signals.try_send(signal) {
            Ok(()) => {}
            Err(SignalBusError::Full) => {
                Metrics::incr(&self.metrics.signals_dropped);
                warn!("Signal bus full, cheat signal dropped");
            }
            Err(SignalBusError::Disconnected) => {
                Metrics::incr(&self.metrics.signals_dropped);
                debug!("Signal consumer gone, cheat signal dropped");
            }
        }
    }

    fn update_tracked_gauge(&self) {
        self.metrics
            .entities_tracked
            .store(self.entities.len() as u64, Ordering::Relaxed);
    }

    pub fn get(&self, entity: EntityId) -> Option<&Reconciler<M>> {
        self.entities.get(&entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut Reconciler<M>> {
        self.entities.get_mut(&entity)
    }

    pub fn rendered_position(&self, entity: EntityId) -> Option<Vec3> {
        self.entities.get(&entity).map(|r| r.rendered_position())
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anticheat::signals::{AbilityCheck, CheatViolation, SignalBus};
    use crate::game::ability::{ScriptedAbility, TargetingType};
    use crate::game::character::PlanarMotor;
    use crate::game::input::MovementInput;
    use uuid::Uuid;

    fn registry(bus: &SignalBus) -> (RemoteEntities<PlanarMotor>, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new());
        let remote = RemoteEntities::new(&GuardConfig::default(), bus.sender(), metrics.clone());
        (remote, metrics)
    }

    fn snap(entity: EntityId, x: f32, timestamp: f64) -> Snapshot {
        Snapshot {
            entity,
            position: Vec3::new(x, 0.0, 0.0),
            health: 100.0,
            mana: 100.0,
            input: MovementInput::IDLE,
            timestamp,
        }
    }

    #[test]
    fn test_join_and_leave() {
        let bus = SignalBus::new(8);
        let (mut remote, metrics) = registry(&bus);
        let id = Uuid::new_v4();

        remote.join(id, PlanarMotor::new(5.0), Vec3::ZERO);
        assert_eq!(remote.len(), 1);
        assert_eq!(metrics.entities_tracked.load(Ordering::Relaxed), 1);

        assert!(remote.leave(id));
        assert!(!remote.leave(id));
        assert!(remote.is_empty());
        assert_eq!(metrics.entities_tracked.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_untracked_snapshot_ignored() {
        let bus = SignalBus::new(8);
        let (mut remote, _) = registry(&bus);
        assert!(remote.apply_snapshot(&snap(Uuid::new_v4(), 1.0, 1.0), 0.0).is_none());
    }

    #[test]
    fn test_speed_hack_publishes_one_signal() {
        let bus = SignalBus::new(8);
        let (mut remote, metrics) = registry(&bus);
        let id = Uuid::new_v4();
        remote.join(id, PlanarMotor::new(5.0), Vec3::ZERO);

        for i in 0..6 {
            let t = i as f64;
            remote.apply_snapshot(&snap(id, i as f32 * 10.0, t), t);
            remote.tick_all(0.1);
        }

        let signals = bus.drain();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].entity, id);
        assert!(matches!(signals[0].violation, CheatViolation::Movement { .. }));
        assert_eq!(metrics.movement_violations.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.snapshots_applied.load(Ordering::Relaxed), 6);
    }

    #[test]
    fn test_leave_discards_excursion() {
        let bus = SignalBus::new(8);
        let (mut remote, _) = registry(&bus);
        let id = Uuid::new_v4();
        remote.join(id, PlanarMotor::new(5.0), Vec3::ZERO);

        remote.apply_snapshot(&snap(id, 0.0, 0.0), 0.0);
        remote.apply_snapshot(&snap(id, 10.0, 1.0), 1.0);
        remote.leave(id);

        // Re-joining starts from a clean slate: no carried-over excursion
        remote.join(id, PlanarMotor::new(5.0), Vec3::new(10.0, 0.0, 0.0));
        remote.apply_snapshot(&snap(id, 20.0, 2.0), 2.0);
        let outcome = remote.apply_snapshot(&snap(id, 30.0, 3.0), 3.0).unwrap();
        assert!(outcome.into_signal().is_none());
        assert!(bus.is_empty());
    }

    #[test]
    fn test_stale_snapshot_counted() {
        let bus = SignalBus::new(8);
        let (mut remote, metrics) = registry(&bus);
        let id = Uuid::new_v4();
        remote.join(id, PlanarMotor::new(5.0), Vec3::ZERO);

        remote.apply_snapshot(&snap(id, 0.0, 2.0), 0.0);
        let outcome = remote.apply_snapshot(&snap(id, 0.5, 1.0), 0.1).unwrap();
        assert!(!outcome.is_applied());
        assert_eq!(metrics.snapshots_dropped.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_rejected_cast_publishes_signal() {
        let bus = SignalBus::new(8);
        let (mut remote, metrics) = registry(&bus);
        let caster = Uuid::new_v4();
        remote.join(caster, PlanarMotor::new(5.0), Vec3::ZERO);

        let ability = ScriptedAbility::targeted(11, TargetingType::Point, 5.0, Vec3::ZERO);
        assert!(remote.observe_cast(caster, &ability, &CastClaim::at_point(Vec3::new(6.5, 0.0, 0.0))));
        assert!(!remote.observe_cast(caster, &ability, &CastClaim::at_point(Vec3::new(30.0, 0.0, 0.0))));

        let signals = bus.drain();
        assert_eq!(signals.len(), 1);
        assert!(signals[0].is_ability());
        assert_eq!(metrics.casts_validated.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.casts_rejected.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_untracked_caster_not_checked() {
        let bus = SignalBus::new(8);
        let (mut remote, metrics) = registry(&bus);
        let ability = ScriptedAbility::targeted(11, TargetingType::Point, 5.0, Vec3::ZERO);

        assert!(remote.observe_cast(Uuid::new_v4(), &ability, &CastClaim::at_point(Vec3::new(90.0, 0.0, 0.0))));
        assert!(bus.is_empty());
        assert_eq!(metrics.casts_validated.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_cost_check_uses_snapshot_mana() {
        let bus = SignalBus::new(8);
        let (mut remote, _) = registry(&bus);
        let caster = Uuid::new_v4();
        remote.join(caster, PlanarMotor::new(5.0), Vec3::ZERO);
        let ability = ScriptedAbility {
            mana_cost: 50.0,
            ..ScriptedAbility::instant(6)
        };
        let claim = CastClaim::at_point(Vec3::ZERO);

        let drained = Snapshot {
            mana: 0.0,
            ..snap(caster, 0.0, 1.0)
        };
        remote.apply_snapshot(&drained, 1.0);
        assert_eq!(remote.get(caster).map(|r| r.motor().mana()), Some(0.0));
        assert!(!remote.observe_cast(caster, &ability, &claim));

        let signals = bus.drain();
        assert_eq!(signals.len(), 1);
        assert_eq!(
            signals[0].violation,
            CheatViolation::Ability {
                ability_id: 6,
                failed: smallvec::smallvec![AbilityCheck::Cost],
            }
        );

        // Within tolerance of the cost once the mirror refills
        let refilled = Snapshot {
            mana: 48.0,
            ..snap(caster, 0.0, 2.0)
        };
        remote.apply_snapshot(&refilled, 2.0);
        assert!(remote.observe_cast(caster, &ability, &claim));
        assert!(bus.is_empty());
    }

    #[test]
    fn test_full_bus_drops_and_counts() {
        let bus = SignalBus::new(1);
        let (mut remote, metrics) = registry(&bus);
        let caster = Uuid::new_v4();
        remote.join(caster, PlanarMotor::new(5.0), Vec3::ZERO);
        let ability = ScriptedAbility {
            cooldown: 10.0,
            cooldown_remaining: 10.0,
            ..ScriptedAbility::instant(1)
        };

        for _ in 0..3 {
            assert!(!remote.observe_cast(caster, &ability, &CastClaim::at_point(Vec3::ZERO)));
        }
        assert_eq!(bus.pending_count(), 1);
        assert_eq!(metrics.signals_dropped.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_tick_all_many_entities() {
        let bus = SignalBus::new(8);
        let (mut remote, metrics) = registry(&bus);
        let ids: Vec<EntityId> = (0..200).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            remote.join(*id, PlanarMotor::new(4.0), Vec3::ZERO);
            remote.apply_snapshot(&snap(*id, 0.125, 1.0), 0.0);
        }

        remote.tick_all(1.0 / 16.0);
        for id in &ids {
            assert_eq!(remote.rendered_position(*id), Some(Vec3::new(0.125, 0.0, 0.0)));
        }
        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_teleport_untracked() {
        let bus = SignalBus::new(8);
        let (mut remote, _) = registry(&bus);
        assert!(!remote.teleport(Uuid::new_v4(), Vec3::ZERO));
    }
}
