//! Outbound cheat signals
//!
//! Detectors return signals as values; the registry forwards them over a
//! bounded crossbeam channel so reporting never blocks the tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use smallvec::SmallVec;

use crate::game::EntityId;

/// Which ability rule a claim broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityCheck {
    Targeting,
    Cooldown,
    Cost,
}

/// Violations detected by the anti-cheat system
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheatViolation {
    #[error("Speed excursion: avg {avg_observed:.2} > allowed {avg_allowed:.2} for {sustained_for:.2}s")]
    Movement {
        avg_observed: f32,
        avg_allowed: f32,
        /// Local-clock seconds the excursion had persisted when reported
        sustained_for: f64,
    },
    #[error("Ability {ability_id} failed checks: {failed:?}")]
    Ability {
        ability_id: u32,
        failed: SmallVec<[AbilityCheck; 3]>,
    },
}

/// A cheat signal raised against a remote entity
#[derive(Debug, Clone, PartialEq)]
pub struct CheatSignal {
    pub entity: EntityId,
    pub violation: CheatViolation,
}

impl CheatSignal {
    pub fn new(entity: EntityId, violation: CheatViolation) -> Self {
        Self { entity, violation }
    }

    pub fn is_movement(&self) -> bool {
        matches!(self.violation, CheatViolation::Movement { .. })
    }

    pub fn is_ability(&self) -> bool {
        matches!(self.violation, CheatViolation::Ability { .. })
    }
}

impl std::fmt::Display for CheatSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.entity, self.violation)
    }
}

/// Bounded signal channel owned by whoever consumes signals
pub struct SignalBus {
    sender: Sender<CheatSignal>,
    receiver: Receiver<CheatSignal>,
    capacity: usize,
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Create a new sender handle for a producer
    pub fn sender(&self) -> SignalSender {
        SignalSender {
            sender: self.sender.clone(),
        }
    }

    /// Drain all pending signals
    pub fn drain(&self) -> Vec<CheatSignal> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(crate::game::constants::net::SIGNAL_BUFFER_SIZE)
    }
}

/// Clonable sender handle
#[derive(Clone)]
pub struct SignalSender {
    sender: Sender<CheatSignal>,
}

impl SignalSender {
    /// Publish a signal (non-blocking)
    #[inline]
    pub fn try_send(&self, signal: CheatSignal) -> Result<(), SignalBusError> {
        self.sender.try_send(signal).map_err(|e| match e {
            TrySendError::Full(_) => SignalBusError::Full,
            TrySendError::Disconnected(_) => SignalBusError::Disconnected,
        })
    }
}

/// Signal bus errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignalBusError {
    #[error("Signal buffer is full")]
    Full,
    #[error("Signal consumer disconnected")]
    Disconnected,
}
