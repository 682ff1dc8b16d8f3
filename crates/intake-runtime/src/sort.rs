use crate::clock::Clock;
use crate::task::{CancelSignal, TaskHandle};
use intake_core::config::SortConfig;
use intake_core::{
    ActuatorArbiter, AllianceColor, AllianceSetting, AuthorityLease, Authority, ColorClassifier,
    CommandIntent, DiagnosticsSink, HueSensor, LifecycleError, SortAction, SortController,
    SortPhase,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSnapshot {
    pub running: bool,
    pub phase: SortPhase,
    pub last_color: Option<AllianceColor>,
    pub ejects_started: u64,
    pub ejects_completed: u64,
    pub ejects_abandoned: u64,
}

impl Default for SortSnapshot {
    fn default() -> Self {
        Self {
            running: false,
            phase: SortPhase::Idle,
            last_color: None,
            ejects_started: 0,
            ejects_completed: 0,
            ejects_abandoned: 0,
        }
    }
}

/// Colour-sort loop with the same lifecycle contract as the stall monitor.
///
/// Stopping is only honoured between eject windows; a window that has begun
/// always runs to completion.
pub struct SortTask {
    arbiter: Arc<ActuatorArbiter>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn DiagnosticsSink>,
    sensor: Arc<StdMutex<Box<dyn HueSensor>>>,
    classifier: ColorClassifier,
    alliance: Arc<AllianceSetting>,
    config: SortConfig,
    handle: Mutex<Option<TaskHandle>>,
    snapshot: Arc<watch::Sender<SortSnapshot>>,
}

impl SortTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        arbiter: Arc<ActuatorArbiter>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn DiagnosticsSink>,
        sensor: Box<dyn HueSensor>,
        classifier: ColorClassifier,
        alliance: Arc<AllianceSetting>,
        config: SortConfig,
    ) -> Self {
        let (tx, _rx) = watch::channel(SortSnapshot::default());
        Self {
            arbiter,
            clock,
            sink,
            sensor: Arc::new(StdMutex::new(sensor)),
            classifier,
            alliance,
            config,
            handle: Mutex::new(None),
            snapshot: Arc::new(tx),
        }
    }

    pub async fn start(&self) -> Result<(), LifecycleError> {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(LifecycleError::AlreadyRunning);
        }
        let ctx = SortLoop {
            arbiter: Arc::clone(&self.arbiter),
            clock: Arc::clone(&self.clock),
            sink: Arc::clone(&self.sink),
            sensor: Arc::clone(&self.sensor),
            classifier: self.classifier.clone(),
            alliance: Arc::clone(&self.alliance),
            controller: SortController::from_config(&self.config),
            poll: self.config.poll_interval(),
            snapshot: Arc::clone(&self.snapshot),
        };
        self.snapshot.send_modify(|s| {
            s.running = true;
            s.phase = SortPhase::Idle;
        });
        *handle = Some(TaskHandle::spawn("color-sort", |cancel| ctx.run(cancel)));
        info!("colour sort started");
        Ok(())
    }

    /// Wait for any open eject window to finish, then stop the loop.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let mut handle = self.handle.lock().await;
        let Some(running) = handle.take() else {
            return Err(LifecycleError::AlreadyStopped);
        };
        running.shutdown().await;
        self.snapshot.send_modify(|s| s.running = false);
        info!("colour sort stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn snapshot(&self) -> SortSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SortSnapshot> {
        self.snapshot.subscribe()
    }
}

struct SortLoop {
    arbiter: Arc<ActuatorArbiter>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn DiagnosticsSink>,
    sensor: Arc<StdMutex<Box<dyn HueSensor>>>,
    classifier: ColorClassifier,
    alliance: Arc<AllianceSetting>,
    controller: SortController,
    poll: std::time::Duration,
    snapshot: Arc<watch::Sender<SortSnapshot>>,
}

impl SortLoop {
    async fn run(mut self, mut cancel: CancelSignal) {
        let arbiter = Arc::clone(&self.arbiter);
        let mut lease: Option<AuthorityLease<'_>> = None;

        loop {
            if self.controller.is_idle() && cancel.is_cancelled() {
                break;
            }

            let hue = self
                .sensor
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .read_hue();
            let color = self.classifier.classify(hue, self.alliance.get());
            let action = self.controller.tick(color, self.clock.now());

            match action {
                SortAction::Pass(color) => {
                    let text = match color {
                        AllianceColor::Ally => "Color Match!",
                        _ => "No Ring!",
                    };
                    self.sink.write(0, text);
                }
                SortAction::BeginEject => {
                    self.sink.write(0, "Color Mismatch!");
                    match arbiter.acquire(Authority::ColorSort) {
                        Ok(held) => {
                            lease = Some(held);
                            info!(hue = ?hue, "eject window opened");
                            self.snapshot.send_modify(|s| s.ejects_started += 1);
                        }
                        Err(e) => {
                            self.controller.abandon();
                            debug!(error = %e, "eject abandoned");
                            self.snapshot.send_modify(|s| s.ejects_abandoned += 1);
                        }
                    }
                }
                SortAction::StopIntake => {
                    self.submit(&arbiter, 0.0);
                }
                SortAction::ResumeIntake { velocity } => {
                    self.submit(&arbiter, velocity);
                    lease = None;
                    info!(velocity, "eject window closed");
                    self.snapshot.send_modify(|s| s.ejects_completed += 1);
                }
                SortAction::Wait => {}
            }

            let phase = self.controller.phase();
            self.snapshot.send_modify(|s| {
                s.phase = phase;
                s.last_color = Some(color);
            });

            match self.controller.deadline() {
                // Mid-eject: sleep exactly to the phase boundary, ignore cancel.
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(self.clock.now());
                    self.clock.sleep(wait).await;
                }
                None => {
                    tokio::select! {
                        _ = self.clock.sleep(self.poll) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
            }
        }

        debug_assert!(lease.is_none());
        self.snapshot.send_modify(|s| s.running = false);
    }

    fn submit(&self, arbiter: &ActuatorArbiter, velocity: f64) {
        let intent = CommandIntent::set_velocity(Authority::ColorSort, velocity);
        if let Err(e) = arbiter.submit(intent) {
            warn!(error = %e, velocity, "colour sort command rejected");
        }
    }
}
