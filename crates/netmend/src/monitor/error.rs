//! Error types for the connectivity monitor.

use std::io;
use std::time::Duration;

/// Result type for monitor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or talking to the monitor.
///
/// Failures inside the classification and repair pipeline never surface
/// here; they are turned into a status value or an outcome event.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from sysfs/procfs reads or the notification socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error from the reachability probe.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform path observer could not be started.
    #[error("path observer unavailable: {reason}")]
    ObserverUnavailable {
        /// Why the observer could not be started.
        reason: String,
    },

    /// An operation did not finish within its budget.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The budget that was exceeded.
        after: Duration,
    },

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The monitor task has shut down.
    #[error("monitor is no longer running")]
    Closed,
}

impl Error {
    /// Create an observer setup error.
    pub fn observer_unavailable(reason: impl Into<String>) -> Self {
        Self::ObserverUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a timeout error for an operation.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Check if this error leaves the monitor inert.
    ///
    /// Only observer setup failures are fatal: without a path observer
    /// there is nothing to classify.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ObserverUnavailable { .. })
    }

    /// Check if this is a timeout, either ours or the HTTP client's.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http(e) => e.is_timeout(),
            Self::Io(e) => e.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}
