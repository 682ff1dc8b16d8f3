use crate::clock::Clock;
use crate::recovery::{RecoveryController, RecoveryOutcome};
use crate::task::{CancelSignal, TaskHandle};
use chrono::{DateTime, Utc};
use intake_core::config::{RecoveryConfig, StallConfig};
use intake_core::{
    ActuatorArbiter, DiagnosticsSink, LifecycleError, MonitorClaim, StallDetector, StallPhase,
    StallReading,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub running: bool,
    pub phase: StallPhase,
    pub last_reading: Option<StallReading>,
    /// Maneuvers that ran to the resume step.
    pub recoveries: u64,
    pub last_recovery: Option<RecoveryOutcome>,
    pub last_recovery_at: Option<DateTime<Utc>>,
}

impl Default for MonitorSnapshot {
    fn default() -> Self {
        Self {
            running: false,
            phase: StallPhase::Idle,
            last_reading: None,
            recoveries: 0,
            last_recovery: None,
            last_recovery_at: None,
        }
    }
}

/// Proof that the stall monitor loop is running. Dropping it cancels the
/// loop without waiting; [`MonitorTask::stop`] also waits for it to exit.
#[derive(Debug)]
pub struct MonitorTaskHandle {
    task: TaskHandle,
}

impl MonitorTaskHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start/stop lifecycle around one StallDetector + RecoveryController loop.
///
/// `start` and `stop` are serialised by an async mutex, and `stop` waits for
/// the loop to exit, so two loops never drive the same actuator. The arbiter's
/// monitor claim extends that guarantee across `MonitorTask` instances.
pub struct MonitorTask {
    arbiter: Arc<ActuatorArbiter>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn DiagnosticsSink>,
    stall: StallConfig,
    recovery: RecoveryConfig,
    handle: Mutex<Option<MonitorTaskHandle>>,
    snapshot: Arc<watch::Sender<MonitorSnapshot>>,
}

impl MonitorTask {
    pub fn new(
        arbiter: Arc<ActuatorArbiter>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn DiagnosticsSink>,
        stall: StallConfig,
        recovery: RecoveryConfig,
    ) -> Self {
        let (tx, _rx) = watch::channel(MonitorSnapshot::default());
        Self {
            arbiter,
            clock,
            sink,
            stall,
            recovery,
            handle: Mutex::new(None),
            snapshot: Arc::new(tx),
        }
    }

    /// Spawn the monitor loop. `AlreadyRunning` if it is running already,
    /// here or through another task on the same arbiter.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(LifecycleError::AlreadyRunning);
        }
        let claim = self.arbiter.claim_monitor()?;

        let ctx = MonitorLoop {
            arbiter: Arc::clone(&self.arbiter),
            clock: Arc::clone(&self.clock),
            recovery: RecoveryController::new(
                Arc::clone(&self.arbiter),
                Arc::clone(&self.clock),
                Arc::clone(&self.sink),
                self.recovery.clone(),
            ),
            detector: StallDetector::from_config(&self.stall),
            poll: self.stall.poll_interval(),
            snapshot: Arc::clone(&self.snapshot),
            claim,
        };
        self.snapshot.send_modify(|s| {
            s.running = true;
            s.phase = StallPhase::Idle;
            s.last_reading = None;
        });
        *handle = Some(MonitorTaskHandle {
            task: TaskHandle::spawn("stall-monitor", |cancel| ctx.run(cancel)),
        });
        info!("stall monitor started");
        Ok(())
    }

    /// Cancel the loop and wait for it to exit. An in-flight recovery
    /// maneuver completes first.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let mut handle = self.handle.lock().await;
        let Some(running) = handle.take() else {
            return Err(LifecycleError::AlreadyStopped);
        };
        running.task.shutdown().await;
        self.snapshot.send_modify(|s| s.running = false);
        info!("stall monitor stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot.subscribe()
    }
}

struct MonitorLoop {
    arbiter: Arc<ActuatorArbiter>,
    clock: Arc<dyn Clock>,
    recovery: RecoveryController,
    detector: StallDetector,
    poll: std::time::Duration,
    snapshot: Arc<watch::Sender<MonitorSnapshot>>,
    claim: MonitorClaim,
}

impl MonitorLoop {
    async fn run(mut self, mut cancel: CancelSignal) {
        while !cancel.is_cancelled() {
            let sample = self.arbiter.sample();
            let reading = self.detector.tick(sample, self.clock.now());
            self.publish(reading);

            if reading.is_stalled() {
                warn!(
                    actual = sample.actual,
                    commanded = sample.commanded,
                    "intake stalled"
                );
                // Not cancellable: a half-finished reversal leaves the
                // actuator in an undefined state.
                let outcome = self.recovery.recover(&mut self.detector).await;
                let recovered = matches!(outcome, RecoveryOutcome::Recovered { .. });
                self.snapshot.send_modify(|s| {
                    if recovered {
                        s.recoveries += 1;
                    }
                    s.phase = self.detector.phase();
                    s.last_recovery = Some(outcome);
                    s.last_recovery_at = Some(Utc::now());
                });
            }

            tokio::select! {
                _ = self.clock.sleep(self.poll) => {}
                _ = cancel.cancelled() => break,
            }
        }
        self.snapshot.send_modify(|s| s.running = false);
        drop(self.claim);
    }

    fn publish(&self, reading: StallReading) {
        let phase = self.detector.phase();
        self.snapshot.send_modify(|s| {
            s.phase = phase;
            s.last_reading = Some(reading);
        });
    }
}
