use crate::clock::Clock;
use intake_core::config::RecoveryConfig;
use intake_core::{
    ActuatorArbiter, ArbitrationError, Authority, CommandIntent, DiagnosticsSink, StallDetector,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// The detector was not `Reversing`; nothing was issued.
    Skipped,
    Recovered { resumed_velocity: f64 },
    /// The arbiter refused the maneuver. The detector was released anyway.
    Aborted { reason: String },
}

/// Drives the reversal maneuver for a stalled intake.
pub struct RecoveryController {
    arbiter: Arc<ActuatorArbiter>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn DiagnosticsSink>,
    config: RecoveryConfig,
}

impl RecoveryController {
    pub fn new(
        arbiter: Arc<ActuatorArbiter>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn DiagnosticsSink>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            arbiter,
            clock,
            sink,
            config,
        }
    }

    /// Reverse, wait for the motion to finish, then restore the velocity that
    /// was commanded when the stall was detected.
    ///
    /// Gated on the detector being `Reversing`, so a second call for the same
    /// episode is a no-op. Holds the `StallRecovery` authority for the whole
    /// maneuver.
    pub async fn recover(&self, detector: &mut StallDetector) -> RecoveryOutcome {
        if !detector.is_reversing() {
            return RecoveryOutcome::Skipped;
        }

        let resume = self.arbiter.target_velocity();
        let lease = match self.arbiter.acquire(Authority::StallRecovery) {
            Ok(lease) => lease,
            Err(e) => return self.abort(detector, e),
        };

        self.sink.write(0, "Intake stuck! Reversing...");
        info!(
            degrees = self.config.reverse_degrees,
            speed = self.config.reverse_speed,
            resume,
            "stall recovery started"
        );

        let reverse = CommandIntent::relative_move(
            Authority::StallRecovery,
            -self.config.reverse_degrees.abs(),
            self.config.reverse_speed,
        );
        if let Err(e) = self.arbiter.submit(reverse) {
            drop(lease);
            return self.abort(detector, e);
        }

        let poll = self.config.poll_interval();
        loop {
            self.clock.sleep(poll).await;
            if self.arbiter.is_stopped()
                || self.arbiter.actual_velocity().abs() <= self.config.settle_velocity
            {
                break;
            }
        }

        if let Err(e) = self
            .arbiter
            .submit(CommandIntent::set_velocity(Authority::StallRecovery, resume))
        {
            warn!(error = %e, "failed to restore intake velocity after recovery");
        }
        detector.finish_recovery();
        drop(lease);

        self.sink.write(
            1,
            &format!("Current velocity: {:.2}", self.arbiter.actual_velocity()),
        );
        info!(resume, "stall recovery finished");
        RecoveryOutcome::Recovered {
            resumed_velocity: resume,
        }
    }

    fn abort(&self, detector: &mut StallDetector, error: ArbitrationError) -> RecoveryOutcome {
        warn!(error = %error, "stall recovery aborted");
        detector.finish_recovery();
        RecoveryOutcome::Aborted {
            reason: error.to_string(),
        }
    }
}
