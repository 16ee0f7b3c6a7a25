//! Platform path observer seam.
//!
//! A [`PathMonitor`] starts [`PathWatch`]es. A watch yields the current
//! path first and then one [`PathSnapshot`] per platform path change, in
//! the order the platform reported them. Dropping a watch cancels it.
//!
//! [`ManualPathMonitor`] is a push-based implementation for hosts that get
//! path callbacks from somewhere else (a mobile shell, a test).

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::error::Result;
use super::path::PathSnapshot;

/// Source of path watches.
pub trait PathMonitor: Send + Sync + 'static {
    /// Watch type produced by this monitor.
    type Watch: PathWatch;

    /// Start watching the network path.
    ///
    /// Fails with [`Error::ObserverUnavailable`](super::Error::ObserverUnavailable)
    /// if the platform cannot observe the path at all.
    fn watch(&self) -> Result<Self::Watch>;
}

/// A live path subscription.
pub trait PathWatch: Send + 'static {
    /// Wait for the next path update. `None` once the watch has ended.
    fn next(&mut self) -> impl Future<Output = Option<PathSnapshot>> + Send;
}

/// Take a single fresh observation.
///
/// Starts a short-lived watch, waits up to `timeout` for its first update
/// and cancels it. Returns `Ok(None)` on timeout or if the watch ended
/// without an update.
pub async fn observe_once<M: PathMonitor>(
    monitor: &M,
    timeout: Duration,
) -> Result<Option<PathSnapshot>> {
    let mut watch = monitor.watch()?;
    let snapshot = tokio::time::timeout(timeout, watch.next())
        .await
        .unwrap_or_else(|_| {
            debug!(?timeout, "no path update before timeout");
            None
        });
    drop(watch);
    Ok(snapshot)
}

/// Push-based [`PathMonitor`].
///
/// Every live watch receives the current snapshot when it starts and then
/// every published snapshot, unbuffered by coalescing.
#[derive(Debug, Clone)]
pub struct ManualPathMonitor {
    inner: Arc<Mutex<ManualInner>>,
}

#[derive(Debug)]
struct ManualInner {
    current: Option<PathSnapshot>,
    watchers: Vec<mpsc::UnboundedSender<PathSnapshot>>,
    silent: bool,
}

impl ManualPathMonitor {
    /// Create a monitor with nothing observed yet.
    ///
    /// Watches started before the first [`publish`](Self::publish) wait for it.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualInner {
                current: None,
                watchers: Vec::new(),
                silent: false,
            })),
        }
    }

    /// Create a monitor whose current path is `initial`.
    pub fn with_initial(initial: PathSnapshot) -> Self {
        let monitor = Self::new();
        monitor.lock().current = Some(initial);
        monitor
    }

    /// Report a path change to every live watch.
    pub fn publish(&self, snapshot: PathSnapshot) {
        let mut inner = self.lock();
        inner.current = Some(snapshot);
        if inner.silent {
            return;
        }
        inner.watchers.retain(|tx| tx.send(snapshot).is_ok());
        trace!(watchers = inner.watchers.len(), "path published");
    }

    /// Record a path change without notifying live watches.
    ///
    /// Models a callback missed while the host was suspended; only watches
    /// started afterwards see it.
    pub fn set_current(&self, snapshot: PathSnapshot) {
        self.lock().current = Some(snapshot);
    }

    /// Stop delivering updates, simulating a platform that never calls back.
    ///
    /// The current snapshot is still recorded.
    pub fn set_silent(&self, silent: bool) {
        self.lock().silent = silent;
    }

    /// Most recently published snapshot.
    pub fn current(&self) -> Option<PathSnapshot> {
        self.lock().current
    }

    /// Number of watches that have not been dropped.
    pub fn live_watches(&self) -> usize {
        let mut inner = self.lock();
        inner.watchers.retain(|tx| !tx.is_closed());
        inner.watchers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualInner> {
        // A poisoned lock only means a publisher panicked mid-push; the
        // data is still a valid snapshot list.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualPathMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PathMonitor for ManualPathMonitor {
    type Watch = ManualWatch;

    fn watch(&self) -> Result<ManualWatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        if let Some(current) = inner.current
            && !inner.silent
        {
            // Receiver is alive, cannot fail.
            let _ = tx.send(current);
        }
        inner.watchers.push(tx);
        Ok(ManualWatch { rx })
    }
}

/// Watch produced by [`ManualPathMonitor`].
#[derive(Debug)]
pub struct ManualWatch {
    rx: mpsc::UnboundedReceiver<PathSnapshot>,
}

impl PathWatch for ManualWatch {
    async fn next(&mut self) -> Option<PathSnapshot> {
        self.rx.recv().await
    }
}
