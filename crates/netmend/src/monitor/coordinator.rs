//! Repair escalation policy.
//!
//! [`AutoRepairCoordinator`] is a two-state machine (`idle`, `repairing`)
//! that decides whether a failure warrants an active repair, and guarantees
//! at most one repair is in flight.

use serde::Serialize;
use tracing::debug;

use super::status::{DeniedInterface, DetailedStatus};

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    /// No repair running.
    Idle,
    /// A repair is in flight.
    Repairing,
}

/// Which repair pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairMode {
    /// Settings inspection, permission probe, reachability probe.
    Full,
    /// Settings inspection and permission probe for a denial signature.
    ///
    /// Falls through to the reachability probe when the permission probe
    /// is inconclusive.
    Lightweight(DeniedInterface),
}

/// Coordinator decision for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Start a repair now; the coordinator is already `repairing`.
    Repair(RepairMode),
    /// Passive wait; let the retry scheduler re-observe.
    Wait,
    /// A repair is already in flight; ignored.
    Busy,
}

/// Escalation state machine.
#[derive(Debug, Clone)]
pub struct AutoRepairCoordinator {
    threshold: u32,
    state: CoordinatorState,
    /// Streak length at which the next full repair may start.
    next_full_at: u32,
    repairs_started: u64,
}

impl AutoRepairCoordinator {
    /// Create an idle coordinator that escalates after `threshold` failures.
    pub fn new(threshold: u32) -> Self {
        let threshold = threshold.max(1);
        Self {
            threshold,
            state: CoordinatorState::Idle,
            next_full_at: threshold,
            repairs_started: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Returns true while a repair is in flight.
    pub fn is_repairing(&self) -> bool {
        self.state == CoordinatorState::Repairing
    }

    /// Failure threshold for a full repair.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Number of repairs started over the coordinator's lifetime.
    pub fn repairs_started(&self) -> u64 {
        self.repairs_started
    }

    /// Evaluate a disconnected observation.
    ///
    /// `entered_denial` is true when this observation moved the status into
    /// a denial signature (from anything else). A denial entered below the
    /// threshold starts a lightweight repair; a streak at the threshold
    /// starts a full one. A full repair is not repeated until `threshold`
    /// further failures accumulate in the same streak.
    pub fn on_regression(
        &mut self,
        consecutive_failures: u32,
        status: DetailedStatus,
        entered_denial: bool,
    ) -> Escalation {
        if self.is_repairing() {
            debug!(consecutive_failures, %status, "repair in flight, ignoring");
            return Escalation::Busy;
        }

        if consecutive_failures >= self.next_full_at {
            self.next_full_at = consecutive_failures.saturating_add(self.threshold);
            return self.begin(RepairMode::Full);
        }

        if entered_denial && let Some(iface) = status.denied_interface() {
            return self.begin(RepairMode::Lightweight(iface));
        }

        Escalation::Wait
    }

    /// Request a full repair outside the streak policy.
    pub fn request(&mut self) -> Escalation {
        if self.is_repairing() {
            return Escalation::Busy;
        }
        self.begin(RepairMode::Full)
    }

    /// Mark the in-flight repair as finished. Safe to call when idle.
    pub fn finish(&mut self) {
        self.state = CoordinatorState::Idle;
    }

    /// Forget the streak bookkeeping after a recovery.
    pub fn reset(&mut self) {
        self.next_full_at = self.threshold;
    }

    fn begin(&mut self, mode: RepairMode) -> Escalation {
        self.state = CoordinatorState::Repairing;
        self.repairs_started += 1;
        debug!(?mode, "repair started");
        Escalation::Repair(mode)
    }
}
