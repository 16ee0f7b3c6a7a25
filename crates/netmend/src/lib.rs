//! Network connectivity monitor with automatic repair.
//!
//! `netmend` observes the network path, decides whether the device is
//! connected, limited, blocked from an interface or offline, and runs a
//! bounded repair procedure when failures persist. The app layer only sees
//! a read-only state snapshot and a stream of typed events.
//!
//! # Example
//!
//! ```ignore
//! use netmend::monitor::{HttpProbe, LinuxPathMonitor, Monitor, MonitorConfig, SystemSettings};
//!
//! #[tokio::main]
//! async fn main() -> netmend::Result<()> {
//!     let config = MonitorConfig::default();
//!     let probe = HttpProbe::new(&config.probe_url, config.reachability_timeout)?;
//!     let handle = Monitor::start(LinuxPathMonitor::default(), probe, SystemSettings::new(), config)?;
//!
//!     let mut events = handle.subscribe();
//!     while let Some(event) = events.recv().await {
//!         println!("{}", event.name());
//!     }
//!     Ok(())
//! }
//! ```

pub mod monitor;
pub mod util;

// Re-export common types at crate root for convenience
pub use monitor::{
    DetailedStatus, Error, Monitor, MonitorConfig, MonitorEvent, MonitorHandle, PathSnapshot,
    Result, StateSnapshot,
};
