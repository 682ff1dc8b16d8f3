use crate::clock::Clock;
use crate::monitor::MonitorTask;
use crate::sort::SortTask;
use intake_core::config::{IntakeMode, OperatorConfig};
use intake_core::{ActuatorArbiter, Authority, CommandIntent, ManualInputSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualDrive {
    Forward,
    Reverse,
    Stopped,
}

/// The driver-control poll loop.
///
/// Each tick re-submits the operator's velocity as a `Manual` intent and
/// starts or stops the stall monitor to match. Rejections are expected while
/// recovery or an eject holds the actuator; the next tick simply retries.
pub struct OperatorControl {
    arbiter: Arc<ActuatorArbiter>,
    clock: Arc<dyn Clock>,
    input: Box<dyn ManualInputSource>,
    monitor: Arc<MonitorTask>,
    sort: Option<Arc<SortTask>>,
    config: OperatorConfig,
    toggled_on: bool,
}

impl OperatorControl {
    pub fn new(
        arbiter: Arc<ActuatorArbiter>,
        clock: Arc<dyn Clock>,
        input: Box<dyn ManualInputSource>,
        monitor: Arc<MonitorTask>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            arbiter,
            clock,
            input,
            monitor,
            sort: None,
            config,
            toggled_on: false,
        }
    }

    /// Start this sort task alongside operator control.
    pub fn with_sort(mut self, sort: Arc<SortTask>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub async fn tick(&mut self) -> ManualDrive {
        let intake = match self.config.mode {
            IntakeMode::Hold => self.input.digital_pressed(self.config.intake_button),
            IntakeMode::Toggle => {
                if self.input.digital_new_press(self.config.intake_button) {
                    self.toggled_on = !self.toggled_on;
                }
                self.toggled_on
            }
        };
        let drive = if intake {
            ManualDrive::Forward
        } else if self.input.digital_pressed(self.config.reverse_button) {
            ManualDrive::Reverse
        } else {
            ManualDrive::Stopped
        };

        let velocity = match drive {
            ManualDrive::Forward => self.config.intake_velocity,
            ManualDrive::Reverse => -self.config.intake_velocity,
            ManualDrive::Stopped => 0.0,
        };
        if let Err(e) = self
            .arbiter
            .submit(CommandIntent::set_velocity(Authority::Manual, velocity))
        {
            debug!(error = %e, velocity, "manual command rejected");
        }

        // Idempotent on both sides; the lifecycle errors only say "no change".
        let _ = match drive {
            ManualDrive::Forward => self.monitor.start().await,
            ManualDrive::Reverse | ManualDrive::Stopped => self.monitor.stop().await,
        };
        drive
    }

    /// Poll for `duration` of clock time, then stop everything.
    pub async fn run_for(&mut self, duration: std::time::Duration) {
        if let Some(sort) = &self.sort {
            let _ = sort.start().await;
        }
        let poll = self.config.poll_interval();
        let end = self.clock.now() + duration;
        while self.clock.now() < end {
            self.tick().await;
            let remaining = end.saturating_duration_since(self.clock.now());
            self.clock.sleep(poll.min(remaining)).await;
        }
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        let _ = self.monitor.stop().await;
        if let Some(sort) = &self.sort {
            let _ = sort.stop().await;
        }
        if let Err(e) = self
            .arbiter
            .submit(CommandIntent::set_velocity(Authority::Manual, 0.0))
        {
            debug!(error = %e, "final stop rejected");
        }
    }
}
