use std::str::FromStr;

use crate::anticheat::movement::MovementConfig;
use crate::anticheat::validator::AbilityTolerances;
use crate::game::constants::{net, reconcile};
use crate::net::reconciler::ReconcileConfig;

/// Sync guard configuration
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Movement anomaly detection thresholds
    pub movement: MovementConfig,
    /// Ability-use tolerances
    pub ability: AbilityTolerances,
    /// Interpolation / extrapolation bounds
    pub reconcile: ReconcileConfig,
    /// Outbound cheat signal channel capacity
    pub signal_buffer: usize,
    /// Render tick rate for replay (Hz)
    pub tick_rate: u32,
    /// Port for the metrics endpoint, disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            movement: MovementConfig::default(),
            ability: AbilityTolerances::default(),
            reconcile: ReconcileConfig::default(),
            signal_buffer: net::SIGNAL_BUFFER_SIZE,
            tick_rate: reconcile::TICK_RATE,
            metrics_port: None,
        }
    }
}

/// Parse an env var into `target`, warning and keeping the default on bad input
fn override_from_env<T: FromStr>(name: &str, target: &mut T, valid: impl Fn(&T) -> bool) {
    let Ok(raw) = std::env::var(name) else {
        return;
    };
    match raw.parse::<T>() {
        Ok(parsed) if valid(&parsed) => *target = parsed,
        Ok(_) => tracing::warn!("{} '{}' out of range, using default", name, raw),
        Err(_) => tracing::warn!("Invalid {} '{}', using default", name, raw),
    }
}

impl GuardConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        override_from_env("MOVEMENT_THRESHOLD", &mut config.movement.threshold, |v: &f32| {
            v.is_finite() && *v >= 0.0
        });
        override_from_env("CHEAT_TIME", &mut config.movement.cheat_time, |v: &f64| {
            v.is_finite() && *v >= 0.0
        });
        override_from_env("RANGE_TOLERANCE", &mut config.ability.range, |v: &f32| {
            v.is_finite() && *v <= 0.0
        });
        override_from_env("COOLDOWN_TOLERANCE", &mut config.ability.cooldown, |v: &f32| {
            v.is_finite() && *v >= 0.0
        });
        override_from_env("COST_TOLERANCE", &mut config.ability.cost, |v: &f32| {
            v.is_finite() && *v >= 0.0
        });
        override_from_env("MAX_LERP_TIME", &mut config.reconcile.max_lerp_time, |v: &f32| {
            v.is_finite() && *v > 0.0
        });
        override_from_env(
            "MAX_EXTRAPOLATION_TIME",
            &mut config.reconcile.max_extrapolation_time,
            |v: &f32| v.is_finite() && *v >= 0.0,
        );
        override_from_env("SIGNAL_BUFFER", &mut config.signal_buffer, |v: &usize| {
            *v > 0 && *v <= 65536
        });
        override_from_env("TICK_RATE", &mut config.tick_rate, |v: &u32| *v > 0 && *v <= 1000);

        if let Ok(port) = std::env::var("METRICS_PORT") {
            match port.parse::<u16>() {
                Ok(parsed) if parsed > 0 => config.metrics_port = Some(parsed),
                _ => tracing::warn!("Invalid METRICS_PORT '{}', metrics endpoint disabled", port),
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if !(self.movement.threshold >= 0.0) {
            return Err("movement threshold must be >= 0".to_string());
        }
        if !(self.movement.cheat_time >= 0.0) {
            return Err("cheat_time must be >= 0".to_string());
        }
        if self.ability.range > 0.0 {
            return Err("range tolerance must be <= 0 (a differential below zero is out of range)".to_string());
        }
        if self.ability.cooldown < 0.0 || self.ability.cost < 0.0 {
            return Err("cooldown and cost tolerances must be >= 0".to_string());
        }
        if !(self.reconcile.max_lerp_time > 0.0) {
            return Err("max_lerp_time must be > 0".to_string());
        }
        if !(self.reconcile.max_extrapolation_time >= 0.0) {
            return Err("max_extrapolation_time must be >= 0".to_string());
        }
        if self.signal_buffer == 0 {
            return Err("signal_buffer must be at least 1".to_string());
        }
        if self.tick_rate == 0 {
            return Err("tick_rate must be at least 1".to_string());
        }
        Ok(())
    }

    /// Render tick length in seconds
    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GuardConfig::default();
        assert_eq!(config.movement.threshold, 0.5);
        assert_eq!(config.movement.cheat_time, 1.0);
        assert_eq!(config.ability.range, -2.0);
        assert_eq!(config.ability.cooldown, 1.0);
        assert_eq!(config.ability.cost, 2.0);
        assert_eq!(config.reconcile.max_lerp_time, 0.1);
        assert_eq!(config.reconcile.max_extrapolation_time, 0.1);
        assert!(config.metrics_port.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = GuardConfig::load_or_default();
        assert!(config.tick_rate > 0);
    }

    #[test]
    fn test_validate_rejects_positive_range_tolerance() {
        let mut config = GuardConfig::default();
        config.ability.range = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_lerp_time() {
        let mut config = GuardConfig::default();
        config.reconcile.max_lerp_time = 0.0;
        assert!(config.validate().is_err());

        config.reconcile.max_lerp_time = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_dt() {
        let config = GuardConfig {
            tick_rate: 50,
            ..Default::default()
        };
        assert!((config.tick_dt() - 0.02).abs() < 1e-6);
    }
}
