pub mod ability;
pub mod character;
pub mod constants;
pub mod input;

/// Identifier of a tracked remote entity
pub type EntityId = uuid::Uuid;
