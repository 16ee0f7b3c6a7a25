//! Connectivity state container.
//!
//! [`ConnectivityState`] is owned by exactly one task (the monitor actor)
//! and mutated only through [`ConnectivityState::apply`]. Everyone else
//! reads a [`StateSnapshot`] copy.

use serde::Serialize;

use super::classify::Classification;
use super::status::{ConnectionType, DetailedStatus};

/// What a classification did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Nothing observable changed.
    NoChange,
    /// Still connected, but status or connection type changed.
    Changed,
    /// Disconnected to connected.
    Recovered,
    /// Connected to disconnected.
    Regressed,
    /// Disconnected before and after.
    StillDown,
}

impl TransitionKind {
    /// Returns true if consumers should be told about this transition.
    pub fn is_change(self) -> bool {
        self != TransitionKind::NoChange
    }

    /// Returns true for transitions that leave the path disconnected.
    pub fn is_down(self) -> bool {
        matches!(self, TransitionKind::Regressed | TransitionKind::StillDown)
    }
}

/// Long-lived connectivity state.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityState {
    status: DetailedStatus,
    connection_type: ConnectionType,
    is_connected: bool,
    consecutive_failures: u32,
    last_failure_reason: Option<String>,
}

impl ConnectivityState {
    /// Create the initial state (`unknown`, not connected, no failures).
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a classification and report the transition.
    ///
    /// Every disconnected observation extends the failure streak; a
    /// recovery resets it. `is_connected` is always derived from `status`.
    pub fn apply(&mut self, classification: Classification) -> TransitionKind {
        let was_connected = self.is_connected;
        let now_connected = classification.status.is_connected();

        let kind = match (was_connected, now_connected) {
            (false, true) => TransitionKind::Recovered,
            (true, false) => TransitionKind::Regressed,
            (false, false) => TransitionKind::StillDown,
            (true, true)
                if self.status != classification.status
                    || self.connection_type != classification.connection_type =>
            {
                TransitionKind::Changed
            }
            (true, true) => TransitionKind::NoChange,
        };

        self.status = classification.status;
        self.connection_type = classification.connection_type;
        self.is_connected = now_connected;

        match kind {
            TransitionKind::Recovered => {
                self.consecutive_failures = 0;
                self.last_failure_reason = None;
            }
            TransitionKind::Regressed | TransitionKind::StillDown => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.last_failure_reason = classification.reason;
            }
            TransitionKind::Changed | TransitionKind::NoChange => {}
        }

        if self.status == DetailedStatus::Connected {
            self.last_failure_reason = None;
        }

        kind
    }

    /// Current detailed status.
    pub fn status(&self) -> DetailedStatus {
        self.status
    }

    /// Current connection type.
    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    /// Whether the path is usable.
    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    /// Length of the current failure streak.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Explanation for the most recent failure.
    pub fn last_failure_reason(&self) -> Option<&str> {
        self.last_failure_reason.as_deref()
    }

    /// Read-only copy for external consumers.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            status: self.status,
            connection_type: self.connection_type,
            is_connected: self.is_connected,
            consecutive_failures: self.consecutive_failures,
            last_failure_reason: self.last_failure_reason.clone(),
            retrying: false,
            repairing: false,
        }
    }
}

/// Read-only view of the monitor state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    /// Detailed status.
    pub status: DetailedStatus,
    /// Interface the path is routed through.
    pub connection_type: ConnectionType,
    /// Whether the path is usable.
    pub is_connected: bool,
    /// Length of the current failure streak.
    pub consecutive_failures: u32,
    /// Explanation for the most recent failure.
    pub last_failure_reason: Option<String>,
    /// The retry scheduler is running.
    pub retrying: bool,
    /// A repair attempt is in flight.
    pub repairing: bool,
}
