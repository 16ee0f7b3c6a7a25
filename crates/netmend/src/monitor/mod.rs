//! Connectivity monitoring and auto-repair.
//!
//! This module watches the network path, classifies it into a
//! [`DetailedStatus`], keeps a failure streak and escalates persistent or
//! specific failures into a repair attempt. Results reach the app as typed
//! [`MonitorEvent`]s.
//!
//! # Quick Start
//!
//! ```ignore
//! use netmend::monitor::{
//!     HttpProbe, LinuxPathConfig, LinuxPathMonitor, Monitor, MonitorConfig, SystemSettings,
//! };
//!
//! let config = MonitorConfig::default();
//! let probe = HttpProbe::new(&config.probe_url, config.reachability_timeout)?;
//! let handle = Monitor::start(
//!     LinuxPathMonitor::new(LinuxPathConfig::default()),
//!     probe,
//!     SystemSettings::new(),
//!     config,
//! )?;
//!
//! println!("{:?}", handle.state().status);
//! ```
//!
//! # Events
//!
//! ```ignore
//! use netmend::monitor::MonitorEvent;
//!
//! let mut events = handle.subscribe();
//! while let Some(event) = events.recv().await {
//!     match event {
//!         MonitorEvent::StatusChanged { status, .. } => println!("now {status}"),
//!         MonitorEvent::PermissionFixNeeded { title, .. } => println!("{title}"),
//!         _ => {}
//!     }
//! }
//! ```
//!
//! # Custom platforms
//!
//! Hosts that receive path callbacks from elsewhere can push them through a
//! [`ManualPathMonitor`], or implement [`PathMonitor`] directly.

pub mod classify;
pub mod config;
pub mod coordinator;
pub mod engine;
mod error;
pub mod events;
pub mod linux;
pub mod observer;
pub mod path;
pub mod probe;
pub mod repair;
pub mod retry;
pub mod settings;
pub mod state;
pub mod status;

pub use classify::{Classification, classify};
pub use config::{Config, MonitorConfig};
pub use coordinator::{AutoRepairCoordinator, CoordinatorState, Escalation, RepairMode};
pub use engine::{Monitor, MonitorHandle};
pub use error::{Error, Result};
pub use events::{EventBus, EventStream, EventSubscriber, MonitorEvent};
pub use linux::{LinuxPathConfig, LinuxPathMonitor, Trigger};
pub use observer::{ManualPathMonitor, PathMonitor, PathWatch, observe_once};
pub use path::{InterfaceSet, InterfaceType, PathSnapshot};
pub use probe::{HttpProbe, ReachabilityProbe};
pub use repair::{RepairAttempt, RepairOutcome, RepairProcedure, RepairStep, StepResult, StepStatus};
pub use retry::RetryScheduler;
pub use settings::{Capability, SettingsInspector, SystemSettings};
pub use state::{ConnectivityState, StateSnapshot, TransitionKind};
pub use status::{ConnectionType, DeniedInterface, DetailedStatus};
