//! Async control loops for the shared intake.
//!
//! # Architecture
//!
//! ```text
//! OperatorControl ──submit(Manual)──────────────┐
//!     │ start/stop                              ▼
//!     ▼                                   ActuatorArbiter ──▶ ActuatorHandle
//! MonitorTask ── StallDetector                  ▲
//!     │          RecoveryController ─(StallRecovery)
//!     │                                         │
//! SortTask ──── SortController ────(ColorSort)──┘
//! ```
//!
//! Each loop is a tokio task owned through a [`TaskHandle`](task::TaskHandle)
//! and only yields at its [`Clock::sleep`] call. Loops publish read-only
//! snapshots through `tokio::sync::watch`.

pub mod clock;
pub mod diagnostics;
pub mod monitor;
pub mod operator;
pub mod recovery;
pub mod sim;
pub mod sort;
pub mod system;
pub mod task;


pub use clock::{Clock, TokioClock};
pub use diagnostics::{RecordingSink, TracingSink};
pub use monitor::{MonitorSnapshot, MonitorTask, MonitorTaskHandle};
pub use operator::{ManualDrive, OperatorControl};
pub use recovery::{RecoveryController, RecoveryOutcome};
pub use sim::{ScriptedHueSensor, ScriptedInput, SimActuator, SimActuatorConfig};
pub use sort::{SortSnapshot, SortTask};
pub use system::{Collaborators, IntakeSystem, SystemReport};
