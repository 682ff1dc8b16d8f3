//! Shared-intake control core.
//!
//! One motor, three controllers competing for it: the operator, the colour
//! sorter and the stall recovery. Everything in this crate is synchronous and
//! clock-agnostic; callers pass `Instant`s in and apply the returned actions.
//!
//! ```text
//!   ManualInput ──┐
//!   SortController┼──▶ ActuatorArbiter ──▶ ActuatorHandle
//!   StallDetector ┘     (StallRecovery > ColorSort > Manual)
//! ```

pub mod alliance;
pub mod arbiter;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod ports;
pub mod sort;
pub mod types;

pub use alliance::AllianceSetting;
pub use arbiter::{ActuatorArbiter, ArbiterStatus, AuthorityLease, MonitorClaim};
pub use classifier::{ColorBands, ColorClassifier, HueBand};
pub use config::{Config, ConfigWarning, WarnLevel};
pub use detector::{StallDetector, StallDetectorState, StallPhase, StallReading};
pub use error::{ArbitrationError, IntakeError, LifecycleError, Result};
pub use ports::{ActuatorHandle, DiagnosticsSink, HueSensor, ManualInputSource, NullSink};
pub use sort::{SortAction, SortController, SortPhase, SortState};
pub use types::{
    Alliance, AllianceColor, Authority, Button, CommandIntent, CommandKind, VelocitySample,
};
