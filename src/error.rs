//! Error types for teleoperation.

use std::time::Duration;
use thiserror::Error;

/// Why a servo activation attempt did not complete.
#[derive(Error, Debug)]
pub enum ActivationError {
    /// The servo did not answer within the bounded wait.
    #[error("no response from servo after {0:?}")]
    Timeout(Duration),

    /// The servo answered but reported failure.
    #[error("servo rejected the request: {0}")]
    Rejected(String),

    /// The request could not be delivered to the servo.
    #[error("servo unavailable: {0}")]
    Unavailable(String),
}

/// Teleoperation error type.
#[derive(Error, Debug)]
pub enum TeleopsError {
    /// The servo could not be activated; the next motion call retries.
    #[error("servo activation failed: {0}")]
    ActivationFailed(#[from] ActivationError),

    /// A joint velocity vector does not match the configured joint ordering.
    #[error("mismatch between number of velocities ({actual}) and joints ({expected})")]
    VectorLengthMismatch { expected: usize, actual: usize },

    /// IO error (socket operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Message could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bridge answered with something unexpected
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TeleopsError {
    /// Activation failures are reported to the operator and retried on the next key;
    /// every other error ends the session.
    pub fn is_activation_failure(&self) -> bool {
        matches!(self, TeleopsError::ActivationFailed(_))
    }
}

/// Result type for teleoperation.
pub type TeleopsResult<T> = Result<T, TeleopsError>;
