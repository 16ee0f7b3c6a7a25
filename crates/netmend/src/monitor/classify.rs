//! Path classification.
//!
//! [`classify`] turns a [`PathSnapshot`] into a [`DetailedStatus`], a
//! [`ConnectionType`] and an optional failure reason. It is pure: the same
//! input always yields the same output.
//!
//! # Denial heuristic
//!
//! No platform reports "permission denied" for an interface directly. A
//! path that is satisfied while an interface is available yet unused, and no
//! other radio is used, is taken as evidence that the interface is blocked.
//! This misfires on ordinary handoffs: a VPN tunnel carrying the default
//! route, an interface that flaps while the route moves, or a wired uplink
//! next to an idle WiFi association all look like denials. Callers must
//! treat `wifi_denied`/`cellular_denied` as likely, not certain.

use serde::Serialize;
use tracing::trace;

use super::path::{InterfaceType, PathSnapshot};
use super::status::{ConnectionType, DetailedStatus};

/// Reason recorded when the path is not satisfied.
pub const REASON_NOT_SATISFIED: &str = "path not satisfied";
/// Reason recorded for the WiFi denial signature.
pub const REASON_WIFI_DENIED: &str =
    "WiFi interface available but unused - likely access denied";
/// Reason recorded for the cellular denial signature.
pub const REASON_CELLULAR_DENIED: &str =
    "Cellular interface available but unused - likely access denied";

/// Classifier output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Detailed status.
    pub status: DetailedStatus,
    /// Interface the path is routed through.
    pub connection_type: ConnectionType,
    /// Human-readable explanation for a non-connected status.
    pub reason: Option<String>,
}

impl Classification {
    /// Returns true if the status is a connected one.
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }
}

/// Classify a path snapshot.
///
/// `previous` is only consulted to note that a stale denial reason is being
/// dropped; it never changes the result.
pub fn classify(snapshot: &PathSnapshot, previous: DetailedStatus) -> Classification {
    let connection_type = ConnectionType::from_used(snapshot.used);

    let (status, reason) = if !snapshot.satisfied {
        (
            DetailedStatus::Disconnected,
            Some(REASON_NOT_SATISFIED.to_string()),
        )
    } else if snapshot.constrained {
        (DetailedStatus::ConnectedLimited, None)
    } else {
        denial_signature(snapshot)
            .map(|status| (status, denial_reason(status)))
            .unwrap_or((DetailedStatus::Connected, None))
    };

    if previous.is_denied() && snapshot.satisfied && !status.is_denied() {
        trace!(%previous, %status, "denial signature cleared");
    }

    Classification {
        status,
        connection_type,
        reason,
    }
}

/// Match the interface-available-but-unused pattern.
///
/// WiFi is checked before cellular.
fn denial_signature(snapshot: &PathSnapshot) -> Option<DetailedStatus> {
    let available = |kind| snapshot.available.contains(kind);
    let used = |kind| snapshot.used.contains(kind);

    if available(InterfaceType::Wifi) && !used(InterfaceType::Wifi) && !used(InterfaceType::Cellular)
    {
        Some(DetailedStatus::WifiDenied)
    } else if available(InterfaceType::Cellular)
        && !used(InterfaceType::Cellular)
        && !used(InterfaceType::Wifi)
    {
        Some(DetailedStatus::CellularDenied)
    } else {
        None
    }
}

fn denial_reason(status: DetailedStatus) -> Option<String> {
    match status {
        DetailedStatus::WifiDenied => Some(REASON_WIFI_DENIED.to_string()),
        DetailedStatus::CellularDenied => Some(REASON_CELLULAR_DENIED.to_string()),
        _ => None,
    }
}
