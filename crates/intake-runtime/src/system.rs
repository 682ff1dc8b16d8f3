use crate::clock::Clock;
use crate::monitor::{MonitorSnapshot, MonitorTask};
use crate::operator::OperatorControl;
use crate::sort::{SortSnapshot, SortTask};
use intake_core::{
    ActuatorArbiter, ActuatorHandle, AllianceSetting, ArbiterStatus, ColorClassifier, Config,
    DiagnosticsSink, HueSensor, ManualInputSource,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// The hardware-facing collaborators one system is wired to.
pub struct Collaborators {
    pub actuator: Box<dyn ActuatorHandle>,
    pub sensor: Box<dyn HueSensor>,
    pub input: Box<dyn ManualInputSource>,
    pub sink: Arc<dyn DiagnosticsSink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemReport {
    pub elapsed_ms: u64,
    pub alliance: intake_core::Alliance,
    pub arbiter: ArbiterStatus,
    pub monitor: MonitorSnapshot,
    pub sort: SortSnapshot,
}

/// Arbiter, monitor, colour sort and operator loop wired to one actuator.
pub struct IntakeSystem {
    arbiter: Arc<ActuatorArbiter>,
    alliance: Arc<AllianceSetting>,
    monitor: Arc<MonitorTask>,
    sort: Arc<SortTask>,
    operator: OperatorControl,
    clock: Arc<dyn Clock>,
}

impl IntakeSystem {
    pub fn new(config: &Config, clock: Arc<dyn Clock>, parts: Collaborators) -> Self {
        let arbiter = Arc::new(ActuatorArbiter::from_boxed(parts.actuator));
        let alliance = Arc::new(AllianceSetting::new(config.alliance));
        let monitor = Arc::new(MonitorTask::new(
            Arc::clone(&arbiter),
            Arc::clone(&clock),
            Arc::clone(&parts.sink),
            config.stall.clone(),
            config.recovery.clone(),
        ));
        let sort = Arc::new(SortTask::new(
            Arc::clone(&arbiter),
            Arc::clone(&clock),
            Arc::clone(&parts.sink),
            parts.sensor,
            ColorClassifier::new(config.colors.clone()),
            Arc::clone(&alliance),
            config.sort.clone(),
        ));
        let mut operator = OperatorControl::new(
            Arc::clone(&arbiter),
            Arc::clone(&clock),
            parts.input,
            Arc::clone(&monitor),
            config.operator.clone(),
        );
        if config.operator.color_sort {
            operator = operator.with_sort(Arc::clone(&sort));
        }
        Self {
            arbiter,
            alliance,
            monitor,
            sort,
            operator,
            clock,
        }
    }

    pub fn arbiter(&self) -> &Arc<ActuatorArbiter> {
        &self.arbiter
    }

    pub fn alliance(&self) -> &AllianceSetting {
        &self.alliance
    }

    pub fn monitor(&self) -> &Arc<MonitorTask> {
        &self.monitor
    }

    pub fn sort(&self) -> &Arc<SortTask> {
        &self.sort
    }

    /// Run operator control for `duration`, then stop every loop and report.
    pub async fn run_for(&mut self, duration: Duration) -> SystemReport {
        let started = self.clock.now();
        self.operator.run_for(duration).await;
        SystemReport {
            elapsed_ms: self
                .clock
                .now()
                .saturating_duration_since(started)
                .as_millis() as u64,
            alliance: self.alliance.get(),
            arbiter: self.arbiter.status(),
            monitor: self.monitor.snapshot(),
            sort: self.sort.snapshot(),
        }
    }
}
