//! Offline replay of recorded sync traffic
//!
//! A recording declares the remote entities and lists the messages the
//! transport delivered, each stamped with the local time it arrived. The
//! replay drives the same registry the live client uses on a fixed
//! simulated render tick, so detection results are reproducible.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::anticheat::signals::{CheatSignal, SignalBus};
use crate::anticheat::validator::CastClaim;
use crate::config::GuardConfig;
use crate::game::ability::ScriptedAbility;
use crate::game::character::PlanarMotor;
use crate::game::constants::replay::MAX_EVENT_TIME;
use crate::game::EntityId;
use crate::metrics::Metrics;
use crate::net::protocol::SnapshotMessage;
use crate::net::remote::RemoteEntities;
use crate::util::vec3::Vec3;

fn default_resource() -> f32 {
    100.0
}

/// Remote entity present from the start of the recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDecl {
    pub id: EntityId,
    /// Stat movement speed (units/s)
    pub speed: f32,
    #[serde(default = "default_resource")]
    pub health: f32,
    #[serde(default = "default_resource")]
    pub mana: f32,
    #[serde(default)]
    pub position: Vec3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayEvent {
    Snapshot(SnapshotMessage),
    Cast {
        caster: EntityId,
        ability: ScriptedAbility,
        target_point: Vec3,
        #[serde(default)]
        target_entity: Option<EntityId>,
    },
    Teleport {
        entity: EntityId,
        position: Vec3,
    },
    Leave {
        entity: EntityId,
    },
}

/// Event stamped with its local arrival time (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedEvent {
    pub at: f64,
    #[serde(flatten)]
    pub event: ReplayEvent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recording {
    pub entities: Vec<EntityDecl>,
    #[serde(default)]
    pub events: Vec<TimedEvent>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Failed to read recording: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed recording: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Entity {0} declared more than once")]
    DuplicateEntity(EntityId),

    #[error("Event {index} has invalid arrival time {at}")]
    InvalidTime { index: usize, at: f64 },

    #[error("Event {index} arrives at {at}s, past the {limit}s replay horizon")]
    BeyondHorizon { index: usize, at: f64, limit: f64 },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Recording {
    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        let recording: Recording = serde_json::from_str(json)?;
        recording.check()?;
        Ok(recording)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn check(&self) -> Result<(), ReplayError> {
        let mut seen = hashbrown::HashSet::with_capacity(self.entities.len());
        for decl in &self.entities {
            if !seen.insert(decl.id) {
                return Err(ReplayError::DuplicateEntity(decl.id));
            }
        }
        for (index, event) in self.events.iter().enumerate() {
            if !event.at.is_finite() || event.at < 0.0 {
                return Err(ReplayError::InvalidTime { index, at: event.at });
            }
            if event.at > MAX_EVENT_TIME {
                return Err(ReplayError::BeyondHorizon {
                    index,
                    at: event.at,
                    limit: MAX_EVENT_TIME,
                });
            }
        }
        Ok(())
    }
}

/// Outcome of a replay run
#[derive(Debug)]
pub struct ReplayReport {
    /// Signals in emission order
    pub signals: Vec<CheatSignal>,
    pub ticks: u64,
    pub snapshots_applied: u64,
    pub snapshots_dropped: u64,
    pub casts_validated: u64,
    pub casts_rejected: u64,
    pub signals_dropped: u64,
    /// Rendered position of every entity still tracked at the end, by id
    pub final_positions: Vec<(EntityId, Vec3)>,
    pub metrics: Arc<Metrics>,
}

impl ReplayReport {
    pub fn movement_signals(&self) -> usize {
        self.signals.iter().filter(|s| s.is_movement()).count()
    }

    pub fn ability_signals(&self) -> usize {
        self.signals.iter().filter(|s| s.is_ability()).count()
    }

    pub fn final_position(&self, entity: EntityId) -> Option<Vec3> {
        self.final_positions
            .iter()
            .find(|(id, _)| *id == entity)
            .map(|(_, position)| *position)
    }
}

/// Replay `recording` on a fixed render tick of `config.tick_rate` Hz
///
/// Events due at or before the current simulated time are applied before
/// the tick runs. After the last event the simulation keeps ticking long
/// enough for every interpolation and extrapolation to settle.
pub fn run(recording: &Recording, config: &GuardConfig) -> Result<ReplayReport, ReplayError> {
    config.validate().map_err(ReplayError::Config)?;
    recording.check()?;

    let bus = SignalBus::new(config.signal_buffer);
    let metrics = Arc::new(Metrics::new());
    let mut remote: RemoteEntities<PlanarMotor> = RemoteEntities::new(config, bus.sender(), metrics.clone());

    for decl in &recording.entities {
        let mut motor = PlanarMotor::new(decl.speed);
        motor.health = decl.health;
        motor.mana = decl.mana;
        remote.join(decl.id, motor, decl.position);
    }

    let mut events: Vec<&TimedEvent> = recording.events.iter().collect();
    events.sort_by(|a, b| a.at.total_cmp(&b.at));

    let dt = config.tick_dt();
    let settle = config.reconcile.max_lerp_time + config.reconcile.max_extrapolation_time;
    let settle_ticks = (settle / dt).ceil() as u64 + 1;

    let mut signals = Vec::new();
    let mut next = 0;
    let mut tick: u64 = 0;
    let mut ticks_after_last = 0;

    while ticks_after_last < settle_ticks {
        let now = tick as f64 * dt as f64;

        while let Some(timed) = events.get(next).filter(|e| e.at <= now) {
            apply_event(&mut remote, timed);
            next += 1;
        }

        remote.tick_all(dt);
        signals.extend(bus.drain());

        tick += 1;
        if next == events.len() {
            ticks_after_last += 1;
        }
    }

    let mut final_positions: Vec<(EntityId, Vec3)> = remote
        .ids()
        .filter_map(|id| remote.rendered_position(id).map(|p| (id, p)))
        .collect();
    final_positions.sort_by_key(|(id, _)| *id);

    let load = |counter: &std::sync::atomic::AtomicU64| counter.load(Ordering::Relaxed);
    let report = ReplayReport {
        signals,
        ticks: tick,
        snapshots_applied: load(&metrics.snapshots_applied),
        snapshots_dropped: load(&metrics.snapshots_dropped),
        casts_validated: load(&metrics.casts_validated),
        casts_rejected: load(&metrics.casts_rejected),
        signals_dropped: load(&metrics.signals_dropped),
        final_positions,
        metrics,
    };

    info!(
        ticks = report.ticks,
        signals = report.signals.len(),
        snapshots = report.snapshots_applied,
        "Replay finished"
    );
    Ok(report)
}

fn apply_event(remote: &mut RemoteEntities<PlanarMotor>, timed: &TimedEvent) {
    match &timed.event {
        ReplayEvent::Snapshot(message) => {
            let snapshot = message.clone().into_snapshot();
            remote.apply_snapshot(&snapshot, timed.at);
        }
        ReplayEvent::Cast {
            caster,
            ability,
            target_point,
            target_entity,
        } => {
            let claim = CastClaim {
                target_point: *target_point,
                target_entity: *target_entity,
            };
            let accepted = remote.observe_cast(*caster, ability, &claim);
            debug!(caster = %caster, ability = ability.id, accepted, "Replayed cast");
        }
        ReplayEvent::Teleport { entity, position } => {
            remote.teleport(*entity, *position);
        }
        ReplayEvent::Leave { entity } => {
            remote.leave(*entity);
        }
    }
}
