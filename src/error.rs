//! Error types for the monitor

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced at the controller boundary
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Missing or invalid user input, the controller stays `Idle`
    #[error("{0}")]
    Validation(String),

    #[error("Monitoring is already running")]
    AlreadyRunning,

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// The stats document exists but cannot be decoded
    #[error("Statistics file {path} is unreadable: {reason}")]
    CorruptStats { path: PathBuf, reason: String },

    #[error("Workers did not stop within {0:?}")]
    ShutdownTimeout(Duration),
}

impl MonitorError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Whether the error is a user input problem
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result alias for controller operations
pub type MonitorResult<T> = std::result::Result<T, MonitorError>;
