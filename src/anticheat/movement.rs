//! Movement speed anomaly detection
//!
//! Compares the windowed-average observed speed of a remote entity with the
//! windowed-average speed stat it was allowed at each sample, and reports a
//! violation only once the excursion has persisted on the local clock.

use tracing::{debug, warn};

use crate::anticheat::sample_window::{SampleEntry, SampleWindow};
use crate::anticheat::signals::{CheatSignal, CheatViolation};
use crate::game::constants::movement::{CHEAT_TIME, THRESHOLD};
use crate::game::EntityId;
use crate::util::vec3::Vec3;

/// Configuration for movement anomaly detection
#[derive(Debug, Clone)]
pub struct MovementConfig {
    /// Allowed excess of average observed speed over average allowed speed
    pub threshold: f32,
    /// Local-clock seconds an excursion must persist before it is reported
    pub cheat_time: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            threshold: THRESHOLD,
            cheat_time: CHEAT_TIME,
        }
    }
}

/// The two clocks an observation is stamped with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamps {
    /// Network time of the authoritative snapshot (inter-snapshot deltas)
    pub network: f64,
    /// Local wall clock (excursion persistence)
    pub local: f64,
}

impl Timestamps {
    pub fn new(network: f64, local: f64) -> Self {
        Self { network, local }
    }
}

/// Why an observation contributed no sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// Network time did not advance since the previous position
    NonPositiveElapsed(f64),
    /// NaN or Infinity in position, clocks or speed stat
    NonFinite,
}

/// Detailed outcome of one observation
#[derive(Debug, Clone, PartialEq)]
pub enum MovementVerdict {
    /// First position for this entity, nothing to compare against
    Baseline,
    /// Position unchanged; the window was cleared
    Idle,
    /// Malformed input, sample dropped
    Skipped(SkipReason),
    /// Average speed within threshold
    Within { avg_observed: f32, avg_allowed: f32 },
    /// Average speed above threshold since `since` (local clock)
    Exceeding {
        avg_observed: f32,
        avg_allowed: f32,
        since: f64,
    },
    /// Excursion persisted long enough; reported once
    Violation(CheatSignal),
}

impl MovementVerdict {
    pub fn into_signal(self) -> Option<CheatSignal> {
        match self {
            MovementVerdict::Violation(signal) => Some(signal),
            _ => None,
        }
    }
}

/// Active excursion above threshold
#[derive(Debug, Clone, Copy)]
struct Hysteresis {
    started_at: f64,
    fired: bool,
}

/// Per-entity movement anomaly detector
#[derive(Debug, Clone)]
pub struct MovementDetector {
    entity: EntityId,
    config: MovementConfig,
    window: SampleWindow,
    /// Last position and its network time
    previous: Option<(Vec3, f64)>,
    hysteresis: Option<Hysteresis>,
}

impl MovementDetector {
    pub fn new(entity: EntityId, config: MovementConfig) -> Self {
        Self {
            entity,
            config,
            window: SampleWindow::new(),
            previous: None,
            hysteresis: None,
        }
    }

    /// Feed the next authoritative position; returns a signal at most once
    /// per continuous excursion
    pub fn observe(&mut self, position: Vec3, time: Timestamps, allowed_speed: f32) -> Option<CheatSignal> {
        self.observe_detailed(position, time, allowed_speed).into_signal()
    }

    /// Like [`observe`](Self::observe) but reports what happened to the sample
    pub fn observe_detailed(&mut self, position: Vec3, time: Timestamps, allowed_speed: f32) -> MovementVerdict {
        if !position.is_finite()
            || !time.network.is_finite()
            || !time.local.is_finite()
            || !allowed_speed.is_finite()
        {
            debug!(entity = %self.entity, "Skipping non-finite movement observation");
            return MovementVerdict::Skipped(SkipReason::NonFinite);
        }

        let Some((prev_position, prev_time)) = self.previous else {
            self.previous = Some((position, time.network));
            return MovementVerdict::Baseline;
        };

        let verdict = if prev_position.bit_eq(position) {
            // No movement, no evidence: drop the whole window
            self.window.clear();
            MovementVerdict::Idle
        } else {
            let elapsed = time.network - prev_time;
            if elapsed <= 0.0 {
                debug!(entity = %self.entity, elapsed, "Skipping sample with non-positive elapsed time");
                MovementVerdict::Skipped(SkipReason::NonPositiveElapsed(elapsed))
            } else {
                let elapsed = elapsed as f32;
                self.window.push(SampleEntry {
                    elapsed,
                    observed_speed: prev_position.distance_to(position) / elapsed,
                    allowed_speed,
                });
                self.evaluate(time.local)
            }
        };

        self.previous = Some((position, time.network));
        verdict
    }

    fn evaluate(&mut self, now: f64) -> MovementVerdict {
        let Some((avg_observed, avg_allowed)) = self.window.averages() else {
            return MovementVerdict::Idle;
        };

        if avg_observed <= avg_allowed + self.config.threshold {
            if self.hysteresis.take().is_some() {
                debug!(entity = %self.entity, avg_observed, avg_allowed, "Speed excursion ended");
            }
            return MovementVerdict::Within {
                avg_observed,
                avg_allowed,
            };
        }

        let hysteresis = self.hysteresis.get_or_insert_with(|| {
            debug!(entity = %self.entity, avg_observed, avg_allowed, "Speed excursion started");
            Hysteresis {
                started_at: now,
                fired: false,
            }
        });

        let sustained_for = now - hysteresis.started_at;
        if !hysteresis.fired && sustained_for >= self.config.cheat_time {
            hysteresis.fired = true;
            warn!(
                entity = %self.entity,
                avg_observed,
                avg_allowed,
                sustained_for,
                "Movement speed violation"
            );
            return MovementVerdict::Violation(CheatSignal::new(
                self.entity,
                CheatViolation::Movement {
                    avg_observed,
                    avg_allowed,
                    sustained_for,
                },
            ));
        }

        MovementVerdict::Exceeding {
            avg_observed,
            avg_allowed,
            since: hysteresis.started_at,
        }
    }

    /// Forget baseline, samples and any in-flight excursion
    pub fn reset(&mut self) {
        self.window.clear();
        self.previous = None;
        self.hysteresis = None;
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    /// True while an excursion above threshold is being timed
    pub fn excursion_active(&self) -> bool {
        self.hysteresis.is_some()
    }
}
