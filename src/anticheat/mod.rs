//! Cheat detection for remote entities
//!
//! - `movement` - windowed speed anomaly detection with hysteresis
//! - `validator` - range / cooldown / cost checks on cast claims
//! - `signals` - signal values and the outbound signal bus

pub mod movement;
pub mod sample_window;
pub mod signals;
pub mod validator;

pub use movement::{MovementConfig, MovementDetector, MovementVerdict, Timestamps};
pub use signals::{AbilityCheck, CheatSignal, CheatViolation, SignalBus, SignalSender};
pub use validator::{AbilityTolerances, AbilityValidator, AbilityVerdict, CastClaim};
