//! Stall detection state machine.
//!
//! ```text
//!            commanded != 0              grace elapsed
//!   Idle ───────────────────▶ GracePeriod ────────────▶ Monitoring{armed}
//!    ▲                                                   │        ▲
//!    │ commanded == 0 (from any state but Reversing)     │ stall  │ recovery finished
//!    └───────────────────────────────────────────────────┤        │ (armed = false)
//!                                                        ▼        │
//!                                                     Reversing ──┘
//! ```
//!
//! [`StallDetector::tick`], [`StallDetector::finish_recovery`] and
//! [`StallDetector::reset`] are the only mutators, so `Reversing` can only be
//! reached from `Monitoring`.

use crate::config::{StallConfig, ThresholdComparison};
use crate::types::VelocitySample;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallDetectorState {
    /// No motion commanded, or the monitor was just (re)started.
    Idle,
    /// Spin-up window; stall checks are suppressed.
    GracePeriod { started_at: Instant },
    /// Stall checks active. `armed` is false right after a recovery until a
    /// healthy reading has been seen.
    Monitoring { armed: bool },
    /// A recovery maneuver owns the actuator.
    Reversing,
}

/// Serializable view of [`StallDetectorState`] for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StallPhase {
    Idle,
    GracePeriod,
    Monitoring,
    Reversing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StallReading {
    Running,
    InGracePeriod,
    Stalled,
    /// Tick arrived while a recovery is in progress.
    Recovering,
}

impl StallReading {
    /// `Running` and `InGracePeriod` both mean "leave the actuator alone".
    pub fn is_running(self) -> bool {
        matches!(self, StallReading::Running | StallReading::InGracePeriod)
    }

    pub fn is_stalled(self) -> bool {
        self == StallReading::Stalled
    }
}

#[derive(Debug, Clone)]
pub struct StallDetector {
    state: StallDetectorState,
    threshold: f64,
    grace: Duration,
    comparison: ThresholdComparison,
}

impl StallDetector {
    pub fn new(threshold: f64, grace: Duration, comparison: ThresholdComparison) -> Self {
        Self {
            state: StallDetectorState::Idle,
            threshold,
            grace,
            comparison,
        }
    }

    pub fn from_config(config: &StallConfig) -> Self {
        Self::new(config.velocity_threshold, config.grace(), config.comparison)
    }

    pub fn state(&self) -> StallDetectorState {
        self.state
    }

    pub fn phase(&self) -> StallPhase {
        match self.state {
            StallDetectorState::Idle => StallPhase::Idle,
            StallDetectorState::GracePeriod { .. } => StallPhase::GracePeriod,
            StallDetectorState::Monitoring { .. } => StallPhase::Monitoring,
            StallDetectorState::Reversing => StallPhase::Reversing,
        }
    }

    pub fn is_reversing(&self) -> bool {
        self.state == StallDetectorState::Reversing
    }

    /// Consume one velocity sample taken at `now`.
    pub fn tick(&mut self, sample: VelocitySample, now: Instant) -> StallReading {
        match self.state {
            StallDetectorState::Reversing => StallReading::Recovering,
            _ if sample.commanded == 0.0 => {
                self.state = StallDetectorState::Idle;
                StallReading::Running
            }
            StallDetectorState::Idle => {
                self.state = StallDetectorState::GracePeriod { started_at: now };
                StallReading::InGracePeriod
            }
            StallDetectorState::GracePeriod { started_at } => {
                if now.saturating_duration_since(started_at) < self.grace {
                    return StallReading::InGracePeriod;
                }
                self.state = StallDetectorState::Monitoring { armed: true };
                self.check(sample)
            }
            StallDetectorState::Monitoring { .. } => self.check(sample),
        }
    }

    fn check(&mut self, sample: VelocitySample) -> StallReading {
        let below = self
            .comparison
            .is_below(sample.actual.abs(), self.threshold);
        match self.state {
            StallDetectorState::Monitoring { armed: false } => {
                if !below {
                    self.state = StallDetectorState::Monitoring { armed: true };
                }
                StallReading::Running
            }
            _ if below => {
                self.state = StallDetectorState::Reversing;
                StallReading::Stalled
            }
            _ => StallReading::Running,
        }
    }

    /// Leave `Reversing` once the recovery maneuver has handed control back.
    /// Returns false (and changes nothing) from any other state.
    pub fn finish_recovery(&mut self) -> bool {
        if self.state != StallDetectorState::Reversing {
            return false;
        }
        self.state = StallDetectorState::Monitoring { armed: false };
        true
    }

    /// Back to `Idle`; the next commanded tick starts a fresh grace period.
    pub fn reset(&mut self) {
        self.state = StallDetectorState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 50.0;
    const GRACE: Duration = Duration::from_millis(200);
    const TICK: Duration = Duration::from_millis(20);

    fn detector() -> StallDetector {
        StallDetector::new(THRESHOLD, GRACE, ThresholdComparison::Below)
    }

    fn sample(actual: f64, commanded: f64) -> VelocitySample {
        VelocitySample::new(actual, commanded)
    }

    /// Drive the detector through its grace period with healthy readings and
    /// return the instant of the first post-grace tick.
    fn past_grace(d: &mut StallDetector, t0: Instant, commanded: f64) -> Instant {
        let mut t = t0;
        while t.duration_since(t0) < GRACE {
            assert_eq!(d.tick(sample(commanded, commanded), t), StallReading::InGracePeriod);
            t += TICK;
        }
        t
    }

    #[test]
    fn grace_window_never_reports_stall() {
        let traces: [&[f64]; 4] = [
            &[0.0; 10],
            &[10.0, 5.0, 0.0, 0.0, 1.0, 2.0, 3.0, 0.0, 0.0, 0.0],
            &[-600.0, 0.0, 600.0, 1.0, -1.0, 49.0, 0.0, 0.0, 0.0, 0.0],
            &[49.9; 10],
        ];
        for commanded in [600.0, -600.0, 200.0, 1.0] {
            for trace in traces {
                let mut d = detector();
                let t0 = Instant::now();
                for (i, actual) in trace.iter().enumerate() {
                    let t = t0 + TICK * i as u32;
                    let reading = d.tick(sample(*actual, commanded), t);
                    assert_eq!(reading, StallReading::InGracePeriod);
                    assert!(reading.is_running());
                }
            }
        }
    }

    #[test]
    fn zero_command_never_stalls() {
        let mut d = detector();
        let t0 = Instant::now();
        for i in 0..100u32 {
            let reading = d.tick(sample(0.0, 0.0), t0 + TICK * i);
            assert_eq!(reading, StallReading::Running);
        }
        assert_eq!(d.state(), StallDetectorState::Idle);
    }

    #[test]
    fn slow_after_grace_is_stalled() {
        let mut d = detector();
        let t = past_grace(&mut d, Instant::now(), 600.0);
        assert_eq!(d.tick(sample(10.0, 600.0), t), StallReading::Stalled);
        assert!(d.is_reversing());
    }

    #[test]
    fn negative_velocity_uses_magnitude() {
        let mut d = detector();
        let t = past_grace(&mut d, Instant::now(), -600.0);
        assert_eq!(d.tick(sample(-580.0, -600.0), t), StallReading::Running);
        assert_eq!(d.tick(sample(-10.0, -600.0), t + TICK), StallReading::Stalled);
    }

    #[test]
    fn stalled_reported_once_per_episode() {
        let mut d = detector();
        let mut t = past_grace(&mut d, Instant::now(), 600.0);
        assert_eq!(d.tick(sample(10.0, 600.0), t), StallReading::Stalled);

        // mid-maneuver ticks are suppressed
        for _ in 0..5 {
            t += TICK;
            assert_eq!(d.tick(sample(0.0, 600.0), t), StallReading::Recovering);
        }

        assert!(d.finish_recovery());
        // still slow right after recovery: not re-reported until a healthy reading
        for _ in 0..5 {
            t += TICK;
            assert_eq!(d.tick(sample(5.0, 600.0), t), StallReading::Running);
        }
        t += TICK;
        assert_eq!(d.tick(sample(590.0, 600.0), t), StallReading::Running);
        assert_eq!(d.state(), StallDetectorState::Monitoring { armed: true });

        // a genuinely new stall is reported again
        t += TICK;
        assert_eq!(d.tick(sample(3.0, 600.0), t), StallReading::Stalled);
    }

    #[test]
    fn finish_recovery_outside_reversing_is_noop() {
        let mut d = detector();
        assert!(!d.finish_recovery());
        assert_eq!(d.state(), StallDetectorState::Idle);

        let t = past_grace(&mut d, Instant::now(), 600.0);
        d.tick(sample(600.0, 600.0), t);
        assert!(!d.finish_recovery());
        assert_eq!(d.phase(), StallPhase::Monitoring);
    }

    #[test]
    fn resuming_from_stop_restarts_grace() {
        let mut d = detector();
        let t = past_grace(&mut d, Instant::now(), 600.0);
        assert_eq!(d.tick(sample(600.0, 600.0), t), StallReading::Running);

        // eject window stops the intake
        assert_eq!(d.tick(sample(0.0, 0.0), t + TICK), StallReading::Running);
        assert_eq!(d.phase(), StallPhase::Idle);

        // spin-up after resumption is not a stall
        let resumed = t + TICK * 2;
        assert_eq!(d.tick(sample(0.0, 600.0), resumed), StallReading::InGracePeriod);
        assert_eq!(
            d.tick(sample(20.0, 600.0), resumed + TICK),
            StallReading::InGracePeriod
        );
        assert_eq!(d.tick(sample(20.0, 600.0), resumed + GRACE), StallReading::Stalled);
    }

    #[test]
    fn threshold_comparison_is_configurable() {
        let t0 = Instant::now();

        let mut strict = detector();
        let t = past_grace(&mut strict, t0, 600.0);
        assert_eq!(strict.tick(sample(50.0, 600.0), t), StallReading::Running);

        let mut inclusive = StallDetector::new(THRESHOLD, GRACE, ThresholdComparison::AtOrBelow);
        let t = past_grace(&mut inclusive, t0, 600.0);
        assert_eq!(inclusive.tick(sample(50.0, 600.0), t), StallReading::Stalled);
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut d = detector();
        let t = past_grace(&mut d, Instant::now(), 600.0);
        d.tick(sample(0.0, 600.0), t);
        assert!(d.is_reversing());
        d.reset();
        assert_eq!(d.state(), StallDetectorState::Idle);
    }

    #[test]
    fn from_config_uses_configured_grace() {
        let config = StallConfig {
            grace_ms: 1000,
            ..StallConfig::default()
        };
        let mut d = StallDetector::from_config(&config);
        let t0 = Instant::now();
        d.tick(sample(0.0, 600.0), t0);
        assert_eq!(
            d.tick(sample(0.0, 600.0), t0 + Duration::from_millis(999)),
            StallReading::InGracePeriod
        );
        assert_eq!(
            d.tick(sample(0.0, 600.0), t0 + Duration::from_millis(1000)),
            StallReading::Stalled
        );
    }
}
