//! Repair procedure.
//!
//! A fixed pipeline run when the coordinator escalates:
//!
//! 1. inspect settings (SSID, DNS), diagnostic only
//! 2. permission probe: one fresh observation through a short-lived watch
//! 3. reachability probe: a single bounded HTTP GET
//! 4. outcome: success, permission fix needed, or manual fix needed
//!
//! Every step has a budget, capped by what is left of the attempt's overall
//! deadline. A step that fails or times out is recorded and the pipeline
//! moves on, so [`RepairProcedure::run`] always returns an attempt with
//! exactly one outcome within [`RepairTimeouts::total`].

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::classify::classify;
use super::config::{MonitorConfig, duration_ms, epoch_ms};
use super::coordinator::RepairMode;
use super::events::MonitorEvent;
use super::observer::{PathMonitor, observe_once};
use super::probe::{ReachabilityProbe, is_reachable};
use super::settings::{Capability, SettingsInspector};
use super::status::{DeniedInterface, DetailedStatus};

/// Title of the manual troubleshooting alert.
pub const MANUAL_FIX_TITLE: &str = "Network Connection Issue";

/// Body of the manual troubleshooting alert.
pub const MANUAL_FIX_MESSAGE: &str = "We couldn't restore your connection automatically. Please check:\n\
    \u{2022} Wi-Fi or cellular data is turned on\n\
    \u{2022} Airplane mode is off\n\
    \u{2022} Your router or hotspot is working\n\
    \u{2022} VPN or proxy settings are not blocking traffic";

/// Title and body of the permission alert for an interface.
pub fn permission_alert(interface: DeniedInterface) -> (&'static str, &'static str) {
    match interface {
        DeniedInterface::Wifi => (
            "Wi-Fi Access Required",
            "This app can't use Wi-Fi. Allow Wi-Fi access for this app in Settings, then try again.",
        ),
        DeniedInterface::Cellular => (
            "Cellular Data Access Required",
            "This app can't use cellular data. Turn on cellular data for this app in Settings, then try again.",
        ),
    }
}

/// Pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStep {
    /// Read SSID and DNS servers.
    InspectSettings,
    /// Take a fresh path observation.
    PermissionProbe,
    /// HTTP GET against the probe URL.
    ReachabilityProbe,
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Completed.
    Ok,
    /// Completed with a negative result.
    Failed,
    /// Ran out of budget.
    TimedOut,
    /// Not run.
    Skipped,
}

/// Record of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    /// Which step.
    pub step: RepairStep,
    /// How it ended.
    pub status: StepStatus,
    /// What it found.
    pub detail: String,
    /// Time spent.
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

/// Final result of an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepairOutcome {
    /// Connectivity confirmed.
    Success {
        /// Summary for the user.
        message: String,
    },
    /// The path is blocked for an interface.
    PermissionDenied {
        /// The blocked interface.
        interface: DeniedInterface,
    },
    /// Unreachable with no specific cause.
    Unreachable {
        /// What went wrong.
        reason: String,
    },
}

/// Settings captured during the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsReport {
    /// Current WiFi network.
    pub wifi_ssid: Capability<String>,
    /// Configured DNS servers.
    pub dns_servers: Capability<Vec<IpAddr>>,
}

impl Default for SettingsReport {
    fn default() -> Self {
        Self {
            wifi_ssid: Capability::Unavailable,
            dns_servers: Capability::Unavailable,
        }
    }
}

/// One run of the repair pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairAttempt {
    /// Pipeline variant.
    pub mode: RepairMode,
    /// Steps in execution order.
    pub steps: Vec<StepResult>,
    /// Settings seen by the first step.
    pub settings: SettingsReport,
    /// How the attempt ended.
    pub outcome: RepairOutcome,
    /// Wall-clock start of the attempt.
    #[serde(with = "epoch_ms")]
    pub started_at: SystemTime,
    /// Total time spent.
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl RepairAttempt {
    /// An attempt that died before reaching an outcome.
    pub fn aborted(mode: RepairMode, reason: impl Into<String>) -> Self {
        Self {
            mode,
            steps: Vec::new(),
            settings: SettingsReport::default(),
            outcome: RepairOutcome::Unreachable {
                reason: reason.into(),
            },
            started_at: SystemTime::now(),
            elapsed: Duration::ZERO,
        }
    }

    /// Returns true if connectivity was confirmed.
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, RepairOutcome::Success { .. })
    }

    /// Result for a step, if it was recorded.
    pub fn step(&self, step: RepairStep) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step == step)
    }

    /// The single event that reports this attempt.
    ///
    /// `status` is the monitor status when the attempt finished.
    pub fn to_event(&self, status: DetailedStatus) -> MonitorEvent {
        match &self.outcome {
            RepairOutcome::Success { message } => MonitorEvent::RepairAttempted {
                success: true,
                status,
                message: message.clone(),
            },
            RepairOutcome::PermissionDenied { interface } => {
                let (title, message) = permission_alert(*interface);
                MonitorEvent::PermissionFixNeeded {
                    title: title.to_string(),
                    message: message.to_string(),
                    interface: *interface,
                }
            }
            RepairOutcome::Unreachable { .. } => MonitorEvent::ManualFixNeeded {
                title: MANUAL_FIX_TITLE.to_string(),
                message: MANUAL_FIX_MESSAGE.to_string(),
            },
        }
    }
}

/// Budgets for the pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairTimeouts {
    /// Each settings query.
    pub settings: Duration,
    /// The permission probe observation.
    pub permission_probe: Duration,
    /// The reachability probe.
    pub reachability: Duration,
    /// The whole attempt.
    pub total: Duration,
}

impl From<&MonitorConfig> for RepairTimeouts {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            settings: config.settings_timeout,
            permission_probe: config.permission_probe_timeout,
            reachability: config.reachability_timeout,
            total: config.repair_budget,
        }
    }
}

impl Default for RepairTimeouts {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

/// What the permission probe concluded.
enum PermissionVerdict {
    Connected,
    Denied(DeniedInterface),
    Inconclusive,
}

/// The repair pipeline and its collaborators.
pub struct RepairProcedure<M, P, S> {
    monitor: Arc<M>,
    probe: Arc<P>,
    settings: Arc<S>,
    timeouts: RepairTimeouts,
}

impl<M, P, S> Clone for RepairProcedure<M, P, S> {
    fn clone(&self) -> Self {
        Self {
            monitor: Arc::clone(&self.monitor),
            probe: Arc::clone(&self.probe),
            settings: Arc::clone(&self.settings),
            timeouts: self.timeouts,
        }
    }
}

impl<M, P, S> RepairProcedure<M, P, S>
where
    M: PathMonitor,
    P: ReachabilityProbe,
    S: SettingsInspector,
{
    /// Create a procedure.
    pub fn new(monitor: Arc<M>, probe: Arc<P>, settings: Arc<S>, timeouts: RepairTimeouts) -> Self {
        Self {
            monitor,
            probe,
            settings,
            timeouts,
        }
    }

    /// Step budgets.
    pub fn timeouts(&self) -> RepairTimeouts {
        self.timeouts
    }

    /// Run the pipeline once.
    ///
    /// `status` is the monitor status that triggered the attempt.
    pub async fn run(&self, mode: RepairMode, status: DetailedStatus) -> RepairAttempt {
        let started = Instant::now();
        let started_at = SystemTime::now();
        let deadline = started + self.timeouts.total;
        info!(?mode, %status, "repair attempt started");

        let mut steps = Vec::with_capacity(3);

        let (settings, step) = self.inspect_settings(deadline).await;
        steps.push(step);

        let (verdict, step) = self.permission_probe(status, deadline).await;
        steps.push(step);

        let outcome = match (verdict, mode) {
            (PermissionVerdict::Connected, _) => {
                steps.push(skipped(RepairStep::ReachabilityProbe, "path already connected"));
                RepairOutcome::Success {
                    message: "Connection restored".to_string(),
                }
            }
            (PermissionVerdict::Denied(interface), RepairMode::Lightweight(_)) => {
                steps.push(skipped(RepairStep::ReachabilityProbe, "denial confirmed"));
                RepairOutcome::PermissionDenied { interface }
            }
            (verdict, _) => {
                let (reachable, step) = self.reachability_probe(deadline).await;
                let failure = step.detail.clone();
                steps.push(step);
                match (reachable, verdict) {
                    (true, _) => RepairOutcome::Success {
                        message: "Internet connection verified".to_string(),
                    },
                    (false, PermissionVerdict::Denied(interface)) => {
                        RepairOutcome::PermissionDenied { interface }
                    }
                    (false, _) => RepairOutcome::Unreachable { reason: failure },
                }
            }
        };

        let attempt = RepairAttempt {
            mode,
            steps,
            settings,
            outcome,
            started_at,
            elapsed: started.elapsed(),
        };
        info!(
            outcome = ?attempt.outcome,
            elapsed_ms = attempt.elapsed.as_millis() as u64,
            "repair attempt finished"
        );
        attempt
    }

    async fn inspect_settings(&self, deadline: Instant) -> (SettingsReport, StepResult) {
        let started = Instant::now();
        let budget = self.timeouts.settings.min(remaining(deadline));

        let ssid = tokio::time::timeout(budget, self.settings.wifi_ssid());
        let dns = tokio::time::timeout(budget, self.settings.dns_servers());
        let (ssid, dns) = tokio::join!(ssid, dns);

        let timed_out = ssid.is_err() || dns.is_err();
        let report = SettingsReport {
            wifi_ssid: ssid.unwrap_or(Capability::Unavailable),
            dns_servers: dns.unwrap_or(Capability::Unavailable),
        };

        let detail = format!(
            "ssid: {}, dns: {}",
            match &report.wifi_ssid {
                Capability::Available(ssid) => ssid.clone(),
                Capability::Unavailable => "unavailable".to_string(),
            },
            match &report.dns_servers {
                Capability::Available(servers) => servers
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" "),
                Capability::Unavailable => "unavailable".to_string(),
            }
        );
        debug!(%detail, "settings inspected");

        let status = if timed_out {
            warn!(?budget, "settings query timed out");
            StepStatus::TimedOut
        } else {
            StepStatus::Ok
        };
        (
            report,
            StepResult {
                step: RepairStep::InspectSettings,
                status,
                detail,
                elapsed: started.elapsed(),
            },
        )
    }

    async fn permission_probe(
        &self,
        previous: DetailedStatus,
        deadline: Instant,
    ) -> (PermissionVerdict, StepResult) {
        let started = Instant::now();
        let budget = self.timeouts.permission_probe.min(remaining(deadline));

        let (verdict, status, detail) = match observe_once(&*self.monitor, budget).await {
            Ok(Some(snapshot)) => {
                let classification = classify(&snapshot, previous);
                let status = classification.status;
                if status.is_connected() {
                    (PermissionVerdict::Connected, StepStatus::Ok, format!("path is {status}"))
                } else if let Some(iface) = status.denied_interface() {
                    (
                        PermissionVerdict::Denied(iface),
                        StepStatus::Failed,
                        format!("{iface} access appears blocked"),
                    )
                } else {
                    (PermissionVerdict::Inconclusive, StepStatus::Ok, format!("path is {status}"))
                }
            }
            Ok(None) => (
                PermissionVerdict::Inconclusive,
                StepStatus::TimedOut,
                format!("no observation within {budget:?}"),
            ),
            Err(e) => (
                PermissionVerdict::Inconclusive,
                StepStatus::Failed,
                format!("observer failed: {e}"),
            ),
        };

        if status != StepStatus::Ok {
            warn!(?status, %detail, "permission probe");
        } else {
            debug!(%detail, "permission probe");
        }
        (
            verdict,
            StepResult {
                step: RepairStep::PermissionProbe,
                status,
                detail,
                elapsed: started.elapsed(),
            },
        )
    }

    async fn reachability_probe(&self, deadline: Instant) -> (bool, StepResult) {
        let started = Instant::now();
        let budget = self.timeouts.reachability.min(remaining(deadline));
        if budget.is_zero() {
            warn!("repair budget spent before the reachability probe");
            return (
                false,
                StepResult {
                    step: RepairStep::ReachabilityProbe,
                    status: StepStatus::TimedOut,
                    detail: "repair budget exhausted".to_string(),
                    elapsed: Duration::ZERO,
                },
            );
        }

        let (reachable, status, detail) = match tokio::time::timeout(budget, self.probe.check()).await {
            Ok(Ok(code)) if is_reachable(code) => (true, StepStatus::Ok, format!("HTTP {code}")),
            Ok(Ok(code)) => (false, StepStatus::Failed, format!("HTTP {code}")),
            Ok(Err(e)) if e.is_timeout() => (false, StepStatus::TimedOut, e.to_string()),
            Ok(Err(e)) => (false, StepStatus::Failed, e.to_string()),
            Err(_) => (
                false,
                StepStatus::TimedOut,
                format!("no response within {budget:?}"),
            ),
        };

        if reachable {
            debug!(%detail, "reachability probe");
        } else {
            warn!(?status, %detail, "reachability probe");
        }
        (
            reachable,
            StepResult {
                step: RepairStep::ReachabilityProbe,
                status,
                detail,
                elapsed: started.elapsed(),
            },
        )
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

fn skipped(step: RepairStep, detail: &str) -> StepResult {
    StepResult {
        step,
        status: StepStatus::Skipped,
        detail: detail.to_string(),
        elapsed: Duration::ZERO,
    }
}
