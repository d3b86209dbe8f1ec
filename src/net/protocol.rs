use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::anticheat::validator::CastClaim;
use crate::game::constants::input_bits::{
    HORIZONTAL_POSITIVE, HORIZONTAL_PRESENT, VERTICAL_POSITIVE, VERTICAL_PRESENT,
};
use crate::game::constants::net::MAX_MESSAGE_SIZE;
use crate::game::input::{AxisInput, MovementInput};
use crate::game::EntityId;
use crate::net::reconciler::Snapshot;
use crate::util::vec3::Vec3;

/// Messages delivered by the transport for remote entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Periodic authoritative state
    Snapshot(SnapshotMessage),
    /// A remote entity cast an ability
    Cast(CastMessage),
    /// Authoritative position snap (respawn, correction)
    Teleport { entity: EntityId, position: Vec3 },
    /// Entity left the session
    Leave { entity: EntityId },
}

/// Snapshot as sent on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMessage {
    pub entity: EntityId,
    /// Network time in seconds
    pub timestamp: f64,
    pub health: f32,
    pub mana: f32,
    pub position: Vec3,
    /// Packed movement input, see [`encode_input`]
    pub input_bits: u8,
}

impl SnapshotMessage {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            entity: snapshot.entity,
            timestamp: snapshot.timestamp,
            health: snapshot.health,
            mana: snapshot.mana,
            position: snapshot.position,
            input_bits: encode_input(snapshot.input),
        }
    }

    pub fn into_snapshot(self) -> Snapshot {
        Snapshot {
            entity: self.entity,
            position: self.position,
            health: self.health,
            mana: self.mana,
            input: decode_input(self.input_bits),
            timestamp: self.timestamp,
        }
    }
}

/// Ability cast as sent on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMessage {
    pub caster: EntityId,
    pub ability_id: u32,
    pub target_point: Vec3,
    pub target_entity: Option<EntityId>,
}

impl CastMessage {
    pub fn claim(&self) -> CastClaim {
        CastClaim {
            target_point: self.target_point,
            target_entity: self.target_entity,
        }
    }
}

/// Pack movement input into one byte
///
/// Bit 1: vertical held, bit 2: vertical positive,
/// bit 5: horizontal held, bit 6: horizontal positive. Other bits are zero.
pub fn encode_input(input: MovementInput) -> u8 {
    let mut byte = 0u8;
    {
        let bits = byte.view_bits_mut::<Lsb0>();
        bits.set(VERTICAL_PRESENT, input.vertical.is_active());
        bits.set(VERTICAL_POSITIVE, input.vertical == AxisInput::Positive);
        bits.set(HORIZONTAL_PRESENT, input.horizontal.is_active());
        bits.set(HORIZONTAL_POSITIVE, input.horizontal == AxisInput::Positive);
    }
    byte
}

/// Unpack movement input; unknown bits are ignored
pub fn decode_input(byte: u8) -> MovementInput {
    let bits = byte.view_bits::<Lsb0>();
    let axis = |present: usize, positive: usize| {
        if !bits[present] {
            AxisInput::None
        } else if bits[positive] {
            AxisInput::Positive
        } else {
            AxisInput::Negative
        }
    };
    MovementInput {
        vertical: axis(VERTICAL_PRESENT, VERTICAL_POSITIVE),
        horizontal: axis(HORIZONTAL_PRESENT, HORIZONTAL_POSITIVE),
    }
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers
pub fn encode(message: &SyncMessage) -> Result<Vec<u8>, WireError> {
    let bytes = bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| WireError::Encode(e.to_string()))?;
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(WireError::MessageTooLarge(bytes.len(), MAX_MESSAGE_SIZE));
    }
    Ok(bytes)
}

/// Decode a message using bincode
pub fn decode(data: &[u8]) -> Result<SyncMessage, WireError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(WireError::MessageTooLarge(data.len(), MAX_MESSAGE_SIZE));
    }
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| WireError::Decode(e.to_string()))
}

/// Errors from the sync wire codec
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Message too large: {0} bytes (max {1})")]
    MessageTooLarge(usize, usize),
}
