/// Movement anomaly detection constants
pub mod movement {
    /// Allowed excess of windowed-average speed over windowed-average stat speed
    pub const THRESHOLD: f32 = 0.5;
    /// Seconds (local clock) an excursion must persist before it is reported
    pub const CHEAT_TIME: f64 = 1.0;
    /// Number of speed samples kept in the sliding window
    pub const WINDOW_CAPACITY: usize = 20;
}

/// Ability-use tolerances absorbing latency and float drift
pub mod ability {
    /// Signed distance-over-range differential still accepted (negative = out of range)
    pub const RANGE_TOLERANCE: f32 = -2.0;
    /// Remaining cooldown (seconds) still accepted
    pub const COOLDOWN_TOLERANCE: f32 = 1.0;
    /// Mana shortfall still accepted
    pub const COST_TOLERANCE: f32 = 2.0;
}

/// Render-position reconciliation constants
pub mod reconcile {
    /// Upper bound on a single interpolation toward a snapshot (seconds)
    pub const MAX_LERP_TIME: f32 = 0.1;
    /// Upper bound on dead-reckoning past the last snapshot (seconds)
    pub const MAX_EXTRAPOLATION_TIME: f32 = 0.1;
    /// Render tick rate used by the replay harness (Hz)
    pub const TICK_RATE: u32 = 60;
}

/// Network constants
pub mod net {
    /// Maximum encoded sync message size
    pub const MAX_MESSAGE_SIZE: usize = 1200;
    /// Observed snapshot send rate (Hz)
    pub const SNAPSHOT_RATE: u32 = 20;
    /// Outbound cheat signal channel capacity
    pub const SIGNAL_BUFFER_SIZE: usize = 256;
}

/// Input byte layout (LSB-0 bit positions)
pub mod input_bits {
    pub const VERTICAL_PRESENT: usize = 1;
    pub const VERTICAL_POSITIVE: usize = 2;
    pub const HORIZONTAL_PRESENT: usize = 5;
    pub const HORIZONTAL_POSITIVE: usize = 6;
}

/// Offline replay limits
pub mod replay {
    /// Latest accepted event arrival time (seconds); six hours of play
    pub const MAX_EVENT_TIME: f64 = 6.0 * 3600.0;
}
