//! Render-position reconciliation for one remote entity
//!
//! Authoritative snapshots arrive at a much lower rate than render ticks.
//! Between them the rendered position first glides toward the latest
//! snapshot (bounded interpolation), then keeps moving with the last known
//! input for a short horizon (bounded extrapolation), then holds.

use tracing::debug;

use crate::anticheat::movement::{MovementConfig, MovementDetector, MovementVerdict, Timestamps};
use crate::anticheat::signals::CheatSignal;
use crate::game::character::CharacterMotor;
use crate::game::constants::reconcile::{MAX_EXTRAPOLATION_TIME, MAX_LERP_TIME};
use crate::game::input::MovementInput;
use crate::game::EntityId;
use crate::util::vec3::Vec3;

/// Configuration for render reconciliation
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Upper bound on one interpolation (seconds)
    pub max_lerp_time: f32,
    /// Upper bound on extrapolation past the last snapshot (seconds)
    pub max_extrapolation_time: f32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_lerp_time: MAX_LERP_TIME,
            max_extrapolation_time: MAX_EXTRAPOLATION_TIME,
        }
    }
}

/// Authoritative state of a remote entity at one network time
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub entity: EntityId,
    pub position: Vec3,
    pub health: f32,
    pub mana: f32,
    pub input: MovementInput,
    /// Network time in seconds
    pub timestamp: f64,
}

/// Interpolation in progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lerp {
    pub start: Vec3,
    pub target: Vec3,
    pub elapsed: f32,
    pub duration: f32,
}

/// What currently drives the rendered position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconcilePhase {
    /// Position holds
    Idle,
    /// Gliding toward the latest snapshot
    Interpolating(Lerp),
    /// Dead-reckoning with the last input; `elapsed` is extrapolated time so far
    Extrapolating { elapsed: f32 },
}

/// Why a snapshot was not applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DropReason {
    /// Reconciler disabled (entity left)
    Disabled,
    /// Timestamp not newer than the last applied snapshot
    Stale { timestamp: f64, last_applied: f64 },
    /// NaN or Infinity in snapshot fields
    NonFinite,
}

/// Result of offering a snapshot to the reconciler
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    Applied { movement: MovementVerdict },
    Dropped(DropReason),
}

impl SnapshotOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SnapshotOutcome::Applied { .. })
    }

    pub fn into_signal(self) -> Option<CheatSignal> {
        match self {
            SnapshotOutcome::Applied { movement } => movement.into_signal(),
            SnapshotOutcome::Dropped(_) => None,
        }
    }
}

/// Per-entity state reconciler; owns the entity's movement detector
pub struct Reconciler<M: CharacterMotor> {
    entity: EntityId,
    motor: M,
    detector: MovementDetector,
    config: ReconcileConfig,
    rendered: Vec3,
    authoritative: Vec3,
    input: MovementInput,
    phase: ReconcilePhase,
    last_applied: Option<f64>,
    enabled: bool,
}

impl<M: CharacterMotor> Reconciler<M> {
    pub fn new(
        entity: EntityId,
        motor: M,
        position: Vec3,
        config: ReconcileConfig,
        movement: MovementConfig,
    ) -> Self {
        Self {
            entity,
            motor,
            detector: MovementDetector::new(entity, movement),
            config,
            rendered: position,
            authoritative: position,
            input: MovementInput::IDLE,
            phase: ReconcilePhase::Idle,
            last_applied: None,
            enabled: true,
        }
    }

    /// Apply the next authoritative snapshot
    ///
    /// `local_time` is the local wall clock used for violation persistence;
    /// the snapshot's own timestamp is used for speed measurement.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot, local_time: f64) -> SnapshotOutcome {
        if !self.enabled {
            return SnapshotOutcome::Dropped(DropReason::Disabled);
        }

        if !snapshot.position.is_finite()
            || !snapshot.health.is_finite()
            || !snapshot.mana.is_finite()
            || !snapshot.timestamp.is_finite()
        {
            debug!(entity = %self.entity, "Dropping non-finite snapshot");
            return SnapshotOutcome::Dropped(DropReason::NonFinite);
        }

        if let Some(last_applied) = self.last_applied {
            if snapshot.timestamp <= last_applied {
                debug!(
                    entity = %self.entity,
                    timestamp = snapshot.timestamp,
                    last_applied,
                    "Dropping out-of-order snapshot"
                );
                return SnapshotOutcome::Dropped(DropReason::Stale {
                    timestamp: snapshot.timestamp,
                    last_applied,
                });
            }
        }
        self.last_applied = Some(snapshot.timestamp);

        // Resource mirrors are replaced, never blended
        self.motor.set_resources(snapshot.health, snapshot.mana);
        self.input = snapshot.input;
        self.motor.set_input(snapshot.input);
        self.authoritative = snapshot.position;

        let speed = self.motor.current_speed();
        let movement = self.detector.observe_detailed(
            snapshot.position,
            Timestamps::new(snapshot.timestamp, local_time),
            speed,
        );

        self.start_interpolation(speed);
        SnapshotOutcome::Applied { movement }
    }

    fn start_interpolation(&mut self, speed: f32) {
        let distance = self.rendered.distance_to(self.authoritative);
        if distance > 0.0 {
            let duration = if speed > 0.0 {
                (distance / speed).min(self.config.max_lerp_time)
            } else {
                self.config.max_lerp_time
            };
            self.phase = ReconcilePhase::Interpolating(Lerp {
                start: self.rendered,
                target: self.authoritative,
                elapsed: 0.0,
                duration,
            });
        } else {
            self.phase = ReconcilePhase::Idle;
        }
    }

    /// Advance the rendered state by one render tick
    pub fn tick(&mut self, dt: f32) {
        if !self.enabled || !dt.is_finite() || dt < 0.0 {
            return;
        }

        let mut budget = dt;

        if let ReconcilePhase::Interpolating(mut lerp) = self.phase {
            let previous = lerp.elapsed;
            lerp.elapsed += budget;
            let t = (lerp.elapsed / lerp.duration).min(1.0);
            self.rendered = lerp.start.lerp(lerp.target, t);

            if t >= 1.0 {
                // Unused tick time carries into extrapolation
                budget = (budget - (lerp.duration - previous)).max(0.0);
                self.phase = if self.input.is_moving() {
                    ReconcilePhase::Extrapolating { elapsed: 0.0 }
                } else {
                    ReconcilePhase::Idle
                };
            } else {
                budget = 0.0;
                self.phase = ReconcilePhase::Interpolating(lerp);
            }
        }

        if let ReconcilePhase::Extrapolating { elapsed } = &mut self.phase {
            let step = budget.min(self.config.max_extrapolation_time - *elapsed);
            if step > 0.0 {
                *elapsed += step;
                let speed = self.motor.current_speed();
                self.rendered = self.motor.step(self.rendered, self.input, speed, step);
            }
        }

        self.motor.rotate_towards_look_point(self.rendered, dt);
    }

    /// Snap to `position` without interpolation (respawn, authoritative correction)
    pub fn teleport(&mut self, position: Vec3) {
        if !self.enabled {
            return;
        }
        self.rendered = position;
        self.authoritative = position;
        self.phase = ReconcilePhase::Idle;
        // The jump is not movement evidence
        self.detector.reset();
        debug!(entity = %self.entity, "Teleported");
    }

    /// Stop consuming snapshots and ticks; discards detection state
    pub fn disable(&mut self) {
        self.enabled = false;
        self.phase = ReconcilePhase::Idle;
        self.detector.reset();
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rendered_position(&self) -> Vec3 {
        self.rendered
    }

    pub fn authoritative_position(&self) -> Vec3 {
        self.authoritative
    }

    pub fn decoded_input(&self) -> MovementInput {
        self.input
    }

    pub fn phase(&self) -> ReconcilePhase {
        self.phase
    }

    /// Speed to feed the run animation: stat speed while the rendered
    /// position is being driven, zero while it holds
    pub fn animation_speed(&self) -> f32 {
        match self.phase {
            ReconcilePhase::Interpolating(_) => self.motor.current_speed(),
            ReconcilePhase::Extrapolating { elapsed } if elapsed < self.config.max_extrapolation_time => {
                self.motor.current_speed()
            }
            _ => 0.0,
        }
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    pub fn motor_mut(&mut self) -> &mut M {
        &mut self.motor
    }

    pub fn detector(&self) -> &MovementDetector {
        &self.detector
    }
}
