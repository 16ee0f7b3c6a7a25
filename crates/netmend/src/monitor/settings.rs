//! Best-effort platform settings queries.
//!
//! The repair procedure logs the current WiFi network and DNS servers for
//! diagnosis. Neither is always obtainable, so both come back as a
//! [`Capability`] rather than a sentinel string.

use std::future::Future;
use std::net::IpAddr;
use std::path::PathBuf;

use serde::Serialize;
use tokio::process::Command;
use tracing::trace;

use crate::util::{parse_nameservers, read_interfaces};

/// A value the platform may or may not be able to provide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "value")]
pub enum Capability<T> {
    /// The platform provided the value.
    Available(T),
    /// The platform cannot provide it (no permission, no API, not connected).
    Unavailable,
}

impl<T> Capability<T> {
    /// Returns true if the value is available.
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    /// Convert into an `Option`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Capability::Available(v) => Some(v),
            Capability::Unavailable => None,
        }
    }

    /// Borrow the value if available.
    pub fn as_ref(&self) -> Capability<&T> {
        match self {
            Capability::Available(v) => Capability::Available(v),
            Capability::Unavailable => Capability::Unavailable,
        }
    }
}

impl<T> From<Option<T>> for Capability<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Capability::Unavailable, Capability::Available)
    }
}

/// Settings queries used for repair diagnostics.
pub trait SettingsInspector: Send + Sync + 'static {
    /// SSID of the current WiFi network.
    fn wifi_ssid(&self) -> impl Future<Output = Capability<String>> + Send;

    /// Configured DNS servers.
    fn dns_servers(&self) -> impl Future<Output = Capability<Vec<IpAddr>>> + Send;
}

/// Settings read from the running Linux system.
#[derive(Debug, Clone)]
pub struct SystemSettings {
    resolv_conf: PathBuf,
    sysfs_net: PathBuf,
    iw: PathBuf,
}

impl SystemSettings {
    /// Read from the standard system locations.
    pub fn new() -> Self {
        Self {
            resolv_conf: PathBuf::from("/etc/resolv.conf"),
            sysfs_net: PathBuf::from("/sys/class/net"),
            iw: PathBuf::from("iw"),
        }
    }

    /// Use a different `resolv.conf`.
    pub fn resolv_conf(mut self, path: impl Into<PathBuf>) -> Self {
        self.resolv_conf = path.into();
        self
    }

    /// Use a different sysfs net directory to find the wireless interface.
    pub fn sysfs_net(mut self, path: impl Into<PathBuf>) -> Self {
        self.sysfs_net = path.into();
        self
    }

    /// Use a different `iw` binary.
    pub fn iw_command(mut self, path: impl Into<PathBuf>) -> Self {
        self.iw = path.into();
        self
    }

    fn wireless_interface(&self) -> Option<String> {
        read_interfaces(&self.sysfs_net)
            .ok()?
            .into_iter()
            .find(|i| i.wireless)
            .map(|i| i.name)
    }
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsInspector for SystemSettings {
    async fn wifi_ssid(&self) -> Capability<String> {
        let Some(iface) = self.wireless_interface() else {
            trace!("no wireless interface");
            return Capability::Unavailable;
        };

        let output = match Command::new(&self.iw)
            .args(["dev", &iface, "link"])
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                trace!(status = ?output.status, "iw failed");
                return Capability::Unavailable;
            }
            Err(e) => {
                trace!(error = %e, "cannot run iw");
                return Capability::Unavailable;
            }
        };

        parse_iw_ssid(&String::from_utf8_lossy(&output.stdout)).into()
    }

    async fn dns_servers(&self) -> Capability<Vec<IpAddr>> {
        match tokio::fs::read_to_string(&self.resolv_conf).await {
            Ok(content) => {
                let servers = parse_nameservers(&content);
                if servers.is_empty() {
                    Capability::Unavailable
                } else {
                    Capability::Available(servers)
                }
            }
            Err(e) => {
                trace!(error = %e, path = %self.resolv_conf.display(), "cannot read resolv.conf");
                Capability::Unavailable
            }
        }
    }
}

/// Extract the SSID from `iw dev <if> link` output.
fn parse_iw_ssid(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("SSID:"))
        .map(|ssid| ssid.trim().to_string())
        .filter(|ssid| !ssid.is_empty())
}
