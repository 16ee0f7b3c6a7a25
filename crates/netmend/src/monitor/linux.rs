//! Linux path observer.
//!
//! Builds [`PathSnapshot`]s from sysfs and procfs:
//!
//! - available: non-loopback interfaces that are up
//! - used: interfaces carrying a default route
//! - satisfied: some used interface is up
//! - constrained: a used interface is listed as metered
//!
//! Changes are noticed through an rtnetlink multicast socket subscribed to
//! link, address and route groups. Each wake-up is debounced, the tables are
//! re-read and a snapshot is emitted only if it differs from the last one.
//! [`Trigger::Poll`] re-reads on a timer instead, for containers without
//! netlink access and for tests.

use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};
use serde::{Deserialize, Serialize};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::config::duration_ms;
use super::error::{Error, Result};
use super::observer::{PathMonitor, PathWatch};
use super::path::{InterfaceType, PathSnapshot};
use crate::util::{SysfsInterface, default_route_interfaces, read_interfaces};

/// rtnetlink multicast groups that signal a possible path change.
mod rtnetlink_groups {
    pub const RTNLGRP_LINK: u32 = 1;
    pub const RTNLGRP_IPV4_IFADDR: u32 = 5;
    pub const RTNLGRP_IPV4_ROUTE: u32 = 7;
    pub const RTNLGRP_IPV6_IFADDR: u32 = 9;
    pub const RTNLGRP_IPV6_ROUTE: u32 = 11;

    pub const ALL: [u32; 5] = [
        RTNLGRP_LINK,
        RTNLGRP_IPV4_IFADDR,
        RTNLGRP_IPV4_ROUTE,
        RTNLGRP_IPV6_IFADDR,
        RTNLGRP_IPV6_ROUTE,
    ];
}

/// Raw IP (no link-layer header), used by most modem drivers.
const ARPHRD_RAWIP: u16 = 519;

/// Name prefixes of cellular modem interfaces.
const CELLULAR_PREFIXES: [&str; 3] = ["wwan", "rmnet", "ccmni"];

/// What wakes the watcher up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// rtnetlink multicast notifications.
    #[default]
    Netlink,
    /// Re-read on a fixed interval.
    Poll {
        /// Poll interval.
        #[serde(with = "duration_ms")]
        interval: Duration,
    },
}

/// Linux adapter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxPathConfig {
    /// Interface directory (default: `/sys/class/net`).
    pub sysfs_net: PathBuf,
    /// procfs net directory holding `route` and `ipv6_route` (default: `/proc/net`).
    pub procfs_net: PathBuf,
    /// Interfaces whose use marks the path as constrained.
    pub metered_interfaces: Vec<String>,
    /// Change notification source.
    pub trigger: Trigger,
    /// Quiet period after a notification before re-reading (default: 200ms).
    #[serde(with = "duration_ms")]
    pub debounce: Duration,
}

impl Default for LinuxPathConfig {
    fn default() -> Self {
        Self {
            sysfs_net: PathBuf::from("/sys/class/net"),
            procfs_net: PathBuf::from("/proc/net"),
            metered_interfaces: Vec::new(),
            trigger: Trigger::Netlink,
            debounce: Duration::from_millis(200),
        }
    }
}

impl LinuxPathConfig {
    /// Read interfaces from a different sysfs directory.
    pub fn sysfs_net(mut self, path: impl Into<PathBuf>) -> Self {
        self.sysfs_net = path.into();
        self
    }

    /// Read routes from a different procfs directory.
    pub fn procfs_net(mut self, path: impl Into<PathBuf>) -> Self {
        self.procfs_net = path.into();
        self
    }

    /// Mark an interface as metered.
    pub fn metered(mut self, name: impl Into<String>) -> Self {
        self.metered_interfaces.push(name.into());
        self
    }

    /// Set the change trigger.
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Poll instead of listening for netlink notifications.
    pub fn poll(self, interval: Duration) -> Self {
        self.trigger(Trigger::Poll { interval })
    }

    /// Set the debounce period.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Check for settings the adapter cannot run with.
    pub fn validate(&self) -> Result<()> {
        if let Trigger::Poll { interval } = self.trigger
            && interval.is_zero()
        {
            return Err(Error::InvalidConfig(
                "poll interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Type an interface, or `None` for loopback.
pub fn interface_type(iface: &SysfsInterface) -> Option<InterfaceType> {
    if iface.arphrd == libc::ARPHRD_LOOPBACK || iface.name == "lo" {
        return None;
    }
    let kind = if iface.wireless {
        InterfaceType::Wifi
    } else if CELLULAR_PREFIXES.iter().any(|p| iface.name.starts_with(p))
        || iface.arphrd == libc::ARPHRD_PPP
        || iface.arphrd == ARPHRD_RAWIP
    {
        InterfaceType::Cellular
    } else if iface.arphrd == libc::ARPHRD_ETHER && iface.has_device {
        InterfaceType::Ethernet
    } else {
        InterfaceType::Other
    };
    Some(kind)
}

/// Build a snapshot from the interface list and the default route owners.
pub fn build_snapshot(
    interfaces: &[SysfsInterface],
    routed: &BTreeSet<String>,
    metered: &[String],
) -> PathSnapshot {
    let mut snapshot = PathSnapshot::default();

    for iface in interfaces {
        let Some(kind) = interface_type(iface) else {
            continue;
        };
        let up = iface.is_up();
        if up {
            snapshot.available.insert(kind);
        }
        if routed.contains(&iface.name) {
            snapshot.used.insert(kind);
            snapshot.satisfied |= up;
            snapshot.constrained |= metered.iter().any(|m| m == &iface.name);
        }
    }

    // A metered route that is down does not constrain anything.
    snapshot.constrained &= snapshot.satisfied;
    snapshot
}

/// Read one snapshot from the configured sysfs and procfs trees.
pub fn read_snapshot(config: &LinuxPathConfig) -> Result<PathSnapshot> {
    let interfaces = read_interfaces(&config.sysfs_net)?;
    let routed = default_route_interfaces(&config.procfs_net)?;
    Ok(build_snapshot(
        &interfaces,
        &routed,
        &config.metered_interfaces,
    ))
}

/// [`PathMonitor`] for Linux hosts.
#[derive(Debug, Clone)]
pub struct LinuxPathMonitor {
    config: Arc<LinuxPathConfig>,
}

impl LinuxPathMonitor {
    /// Create a monitor.
    pub fn new(config: LinuxPathConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Adapter settings.
    pub fn config(&self) -> &LinuxPathConfig {
        &self.config
    }

    /// Read the current path without starting a watch.
    pub fn snapshot(&self) -> Result<PathSnapshot> {
        read_snapshot(&self.config)
    }
}

impl Default for LinuxPathMonitor {
    fn default() -> Self {
        Self::new(LinuxPathConfig::default())
    }
}

impl PathMonitor for LinuxPathMonitor {
    type Watch = LinuxWatch;

    /// Start a watch. Must be called from within a tokio runtime.
    fn watch(&self) -> Result<LinuxWatch> {
        self.config.validate()?;
        let initial = read_snapshot(&self.config).map_err(|e| {
            Error::observer_unavailable(format!(
                "cannot read {}: {e}",
                self.config.sysfs_net.display()
            ))
        })?;

        let wake = match self.config.trigger {
            Trigger::Netlink => Wake::Netlink(RouteNotifier::open().map_err(|e| {
                Error::observer_unavailable(format!("rtnetlink subscription failed: {e}"))
            })?),
            Trigger::Poll { interval } => {
                let mut ticker = tokio::time::interval_at(
                    tokio::time::Instant::now() + interval,
                    interval,
                );
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                Wake::Poll(ticker)
            }
        };

        let (tx, rx) = mpsc::channel(16);
        let config = Arc::clone(&self.config);
        let task = tokio::spawn(watch_loop(config, wake, initial, tx));
        Ok(LinuxWatch { rx, task })
    }
}

/// Watch produced by [`LinuxPathMonitor`]. Dropping it stops the background task.
#[derive(Debug)]
pub struct LinuxWatch {
    rx: mpsc::Receiver<PathSnapshot>,
    task: JoinHandle<()>,
}

impl PathWatch for LinuxWatch {
    async fn next(&mut self) -> Option<PathSnapshot> {
        self.rx.recv().await
    }
}

impl Drop for LinuxWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Wake {
    Netlink(RouteNotifier),
    Poll(tokio::time::Interval),
}

impl Wake {
    async fn wait(&mut self) -> io::Result<()> {
        match self {
            Wake::Netlink(notifier) => notifier.wait().await,
            Wake::Poll(ticker) => {
                ticker.tick().await;
                Ok(())
            }
        }
    }

    fn drain(&mut self) {
        if let Wake::Netlink(notifier) = self {
            notifier.drain();
        }
    }
}

async fn watch_loop(
    config: Arc<LinuxPathConfig>,
    mut wake: Wake,
    initial: PathSnapshot,
    tx: mpsc::Sender<PathSnapshot>,
) {
    if tx.send(initial).await.is_err() {
        return;
    }
    let mut last = initial;

    loop {
        if let Err(e) = wake.wait().await {
            warn!(error = %e, "path notification source failed, watch ending");
            return;
        }
        if matches!(wake, Wake::Netlink(_)) && !config.debounce.is_zero() {
            tokio::time::sleep(config.debounce).await;
            wake.drain();
        }

        let snapshot = match read_snapshot(&config) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "cannot read path state");
                continue;
            }
        };
        if snapshot == last {
            trace!("path unchanged");
            continue;
        }
        debug!(?snapshot, "path changed");
        last = snapshot;
        if tx.send(snapshot).await.is_err() {
            return;
        }
    }
}

/// rtnetlink socket used only as a wake-up source.
struct RouteNotifier {
    fd: AsyncFd<Socket>,
    buf: BytesMut,
}

impl RouteNotifier {
    fn open() -> io::Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_ROUTE)?;
        socket.set_non_blocking(true)?;
        socket.bind(&SocketAddr::new(0, 0))?;
        for group in rtnetlink_groups::ALL {
            socket.add_membership(group)?;
        }
        Ok(Self {
            fd: AsyncFd::new(socket)?,
            buf: BytesMut::with_capacity(32768),
        })
    }

    /// Wait for one notification. Message content is not needed.
    async fn wait(&mut self) -> io::Result<()> {
        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;
            self.buf.clear();
            match guard.try_io(|inner| inner.get_ref().recv(&mut self.buf, 0)) {
                Ok(Ok(_)) => return Ok(()),
                // Receive queue overflowed: notifications were lost, re-read anyway.
                Ok(Err(e)) if e.raw_os_error() == Some(libc::ENOBUFS) => return Ok(()),
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }
    }

    /// Discard notifications queued during the debounce period.
    fn drain(&mut self) {
        loop {
            self.buf.clear();
            match self.fd.get_ref().recv(&mut self.buf, 0) {
                Ok(_) => continue,
                Err(e) if e.raw_os_error() == Some(libc::ENOBUFS) => continue,
                Err(_) => break,
            }
        }
    }
}
