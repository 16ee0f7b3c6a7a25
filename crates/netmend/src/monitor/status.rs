//! Connectivity status types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::path::{InterfaceSet, InterfaceType};

/// Why the network is (or is not) usable.
///
/// Mutually exclusive; `connected` and `connected_limited` are the only
/// connected states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailedStatus {
    /// Fully usable path.
    Connected,
    /// Usable but constrained (metered, low-data).
    ConnectedLimited,
    /// WiFi present but apparently blocked.
    WifiDenied,
    /// Cellular present but apparently blocked.
    CellularDenied,
    /// No usable path.
    Disconnected,
    /// Nothing observed yet.
    #[default]
    Unknown,
}

impl DetailedStatus {
    /// Returns true for `connected` and `connected_limited`.
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            DetailedStatus::Connected | DetailedStatus::ConnectedLimited
        )
    }

    /// The interface a denial status refers to, if this is one.
    pub fn denied_interface(self) -> Option<DeniedInterface> {
        match self {
            DetailedStatus::WifiDenied => Some(DeniedInterface::Wifi),
            DetailedStatus::CellularDenied => Some(DeniedInterface::Cellular),
            _ => None,
        }
    }

    /// Returns true for `wifi_denied` and `cellular_denied`.
    pub fn is_denied(self) -> bool {
        self.denied_interface().is_some()
    }

    /// Short human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            DetailedStatus::Connected => "connected",
            DetailedStatus::ConnectedLimited => "connected (limited)",
            DetailedStatus::WifiDenied => "WiFi access denied",
            DetailedStatus::CellularDenied => "cellular access denied",
            DetailedStatus::Disconnected => "disconnected",
            DetailedStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DetailedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Interface the path is routed through, independent of status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Routed through WiFi.
    Wifi,
    /// Routed through cellular.
    Cellular,
    /// Routed through wired ethernet.
    Ethernet,
    /// No recognised interface in use.
    #[default]
    Unknown,
}

impl ConnectionType {
    /// Pick the connection type from the interfaces in use.
    ///
    /// Priority is wifi, then cellular, then ethernet.
    pub fn from_used(used: InterfaceSet) -> Self {
        if used.contains(InterfaceType::Wifi) {
            ConnectionType::Wifi
        } else if used.contains(InterfaceType::Cellular) {
            ConnectionType::Cellular
        } else if used.contains(InterfaceType::Ethernet) {
            ConnectionType::Ethernet
        } else {
            ConnectionType::Unknown
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::Wifi => write!(f, "wifi"),
            ConnectionType::Cellular => write!(f, "cellular"),
            ConnectionType::Ethernet => write!(f, "ethernet"),
            ConnectionType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Interface named by a denial signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeniedInterface {
    /// WiFi was available but unused.
    Wifi,
    /// Cellular was available but unused.
    Cellular,
}

impl DeniedInterface {
    /// The status carrying this denial.
    pub fn status(self) -> DetailedStatus {
        match self {
            DeniedInterface::Wifi => DetailedStatus::WifiDenied,
            DeniedInterface::Cellular => DetailedStatus::CellularDenied,
        }
    }
}

impl fmt::Display for DeniedInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeniedInterface::Wifi => write!(f, "wifi"),
            DeniedInterface::Cellular => write!(f, "cellular"),
        }
    }
}
