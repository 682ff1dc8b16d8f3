use crate::types::Authority;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("config not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid alliance '{0}': expected red or blue")]
    InvalidAlliance(String),

    #[error("invalid authority '{0}': expected manual, color_sort or stall_recovery")]
    InvalidAuthority(String),

    #[error("invalid button '{0}'")]
    InvalidButton(String),

    #[error("alliance already set to {0} for this match phase")]
    AllianceAlreadySet(String),

    #[error(transparent)]
    Arbitration(#[from] ArbitrationError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, IntakeError>;

/// Rejection of a [`CommandIntent`](crate::types::CommandIntent) by the arbiter.
///
/// Never fatal: the caller retries on its next tick.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArbitrationError {
    #[error("{requested} command pre-empted: {holder} holds the actuator")]
    PreemptedByHigherAuthority {
        requested: Authority,
        holder: Authority,
    },

    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

/// Returned by `start`/`stop` when the call was a no-op.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("task already running")]
    AlreadyRunning,

    #[error("task already stopped")]
    AlreadyStopped,
}
