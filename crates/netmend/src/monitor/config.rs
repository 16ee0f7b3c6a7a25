//! Monitor configuration.
//!
//! All settings have working defaults. A [`Config`] can be loaded from JSON
//! where durations are written in milliseconds and missing fields keep
//! their defaults:
//!
//! ```json
//! {
//!   "monitor": { "retry_interval": 5000, "repair_threshold": 3 },
//!   "platform": { "metered_interfaces": ["wwan0"], "trigger": { "kind": "netlink" } }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::linux::LinuxPathConfig;
use super::probe::DEFAULT_PROBE_URL;

/// Engine and repair settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Re-observation interval while disconnected (default: 5s).
    #[serde(with = "duration_ms")]
    pub retry_interval: Duration,
    /// Failure streak length that starts a full repair (default: 3).
    pub repair_threshold: u32,
    /// How long the permission probe waits for its observation (default: 5s).
    #[serde(with = "duration_ms")]
    pub permission_probe_timeout: Duration,
    /// Budget for each settings query (default: 2s).
    #[serde(with = "duration_ms")]
    pub settings_timeout: Duration,
    /// Budget for the reachability probe (default: 10s).
    #[serde(with = "duration_ms")]
    pub reachability_timeout: Duration,
    /// Deadline for a whole repair attempt (default: 10s). Later steps get
    /// whatever is left of it.
    #[serde(with = "duration_ms")]
    pub repair_budget: Duration,
    /// URL the reachability probe fetches.
    pub probe_url: String,
    /// Events buffered per slow subscriber (default: 64).
    pub event_capacity: usize,
    /// Monitor command queue depth (default: 64).
    pub command_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(5),
            repair_threshold: 3,
            permission_probe_timeout: Duration::from_secs(5),
            settings_timeout: Duration::from_secs(2),
            reachability_timeout: Duration::from_secs(10),
            repair_budget: Duration::from_secs(10),
            probe_url: DEFAULT_PROBE_URL.to_string(),
            event_capacity: 64,
            command_capacity: 64,
        }
    }
}

impl MonitorConfig {
    /// Set the retry interval.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the failure threshold for a full repair.
    pub fn repair_threshold(mut self, threshold: u32) -> Self {
        self.repair_threshold = threshold;
        self
    }

    /// Set the permission probe timeout.
    pub fn permission_probe_timeout(mut self, timeout: Duration) -> Self {
        self.permission_probe_timeout = timeout;
        self
    }

    /// Set the settings query timeout.
    pub fn settings_timeout(mut self, timeout: Duration) -> Self {
        self.settings_timeout = timeout;
        self
    }

    /// Set the reachability probe budget.
    pub fn reachability_timeout(mut self, timeout: Duration) -> Self {
        self.reachability_timeout = timeout;
        self
    }

    /// Set the deadline for a whole repair attempt.
    pub fn repair_budget(mut self, budget: Duration) -> Self {
        self.repair_budget = budget;
        self
    }

    /// Set the probe URL.
    pub fn probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = url.into();
        self
    }

    /// Set the event buffer size.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Set the command queue depth.
    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    /// Check the settings for values the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.repair_threshold == 0 {
            return Err(Error::InvalidConfig(
                "repair_threshold must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("retry_interval", self.retry_interval),
            ("permission_probe_timeout", self.permission_probe_timeout),
            ("settings_timeout", self.settings_timeout),
            ("reachability_timeout", self.reachability_timeout),
            ("repair_budget", self.repair_budget),
        ] {
            if value.is_zero() {
                return Err(Error::InvalidConfig(format!("{name} must be non-zero")));
            }
        }
        if self.event_capacity == 0 || self.command_capacity == 0 {
            return Err(Error::InvalidConfig(
                "channel capacities must be non-zero".into(),
            ));
        }
        match reqwest::Url::parse(&self.probe_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            Ok(url) => Err(Error::InvalidConfig(format!(
                "probe_url scheme '{}' is not http(s)",
                url.scheme()
            ))),
            Err(e) => Err(Error::InvalidConfig(format!("probe_url: {e}"))),
        }
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine and repair settings.
    pub monitor: MonitorConfig,
    /// Linux path adapter settings.
    pub platform: LinuxPathConfig,
}

impl Config {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Validate both sections.
    pub fn validate(&self) -> Result<()> {
        self.monitor.validate()?;
        self.platform.validate()
    }
}

/// Serde helper for durations written as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Serde helper for wall-clock times written as milliseconds since the Unix epoch.
pub(crate) mod epoch_ms {
    use std::time::{SystemTime, UNIX_EPOCH};

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = value
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        serializer.serialize_u64(millis)
    }
}
