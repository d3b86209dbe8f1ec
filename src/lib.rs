//! Remote Sync Guard Library
//!
//! Client-side trust layer for remote entities in a networked action game:
//! smooths authoritative snapshots into rendered motion and flags remote
//! players whose movement or ability use the simulation cannot explain.
//!
//! # Features
//!
//! - `parallel` - Tick distinct remote entities on the rayon pool (enabled by default)

pub mod config;
pub mod util;
pub mod game;
pub mod net;
pub mod anticheat;
pub mod metrics;
pub mod replay;
