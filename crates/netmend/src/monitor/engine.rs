//! Monitor engine.
//!
//! [`Monitor::start`] wires the pieces together and returns a
//! [`MonitorHandle`]. One actor task owns the [`ConnectivityState`], the
//! [`RetryScheduler`] and the [`AutoRepairCoordinator`]. Everything that can
//! change them arrives as a [`Command`] on one bounded channel:
//!
//! ```text
//! platform watch ──► forwarder ──┐
//! retry ticks ───────────────────┤
//! health checks ─────────────────┼──► actor ──► EventBus / watch::Sender<StateSnapshot>
//! repair task (supervised) ──────┤
//! handle (repair_now, shutdown) ─┘
//! ```
//!
//! Repairs run in their own task so classification never waits on the
//! network. A supervising task turns a panicked repair into a failed
//! attempt, so the coordinator always returns to idle.
//!
//! Retry ticks and health checks observe outside the actor. Each carries the
//! platform generation it started under; if a platform update arrived in the
//! meantime the observation is stale and dropped.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use super::classify::classify;
use super::config::MonitorConfig;
use super::coordinator::{AutoRepairCoordinator, Escalation, RepairMode};
use super::error::{Error, Result};
use super::events::{EventBus, EventSubscriber, MonitorEvent};
use super::observer::{PathMonitor, PathWatch, observe_once};
use super::path::PathSnapshot;
use super::probe::ReachabilityProbe;
use super::repair::{RepairAttempt, RepairProcedure, RepairTimeouts};
use super::retry::RetryScheduler;
use super::settings::SettingsInspector;
use super::state::{ConnectivityState, StateSnapshot, TransitionKind};

/// Where an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Platform,
    Retry,
    HealthCheck,
}

/// Actor input.
#[derive(Debug)]
enum Command {
    /// A fresh observation, or `None` if none arrived within budget.
    Observed {
        snapshot: Option<PathSnapshot>,
        origin: Origin,
        /// Platform generation when the observation started.
        generation: u64,
        reply: Option<oneshot::Sender<StateSnapshot>>,
    },
    /// Take a fresh observation and reply with the resulting state.
    CheckHealth(oneshot::Sender<StateSnapshot>),
    /// A repair task finished.
    RepairFinished(RepairAttempt),
    /// Start a full repair now; replies whether one was started.
    RepairNow(oneshot::Sender<bool>),
    Shutdown,
}

/// A running repair: the procedure and the task that reports it.
struct RepairTask {
    run: AbortHandle,
    supervisor: JoinHandle<()>,
}

impl RepairTask {
    fn abort(&self) {
        self.run.abort();
        self.supervisor.abort();
    }
}

/// The monitor actor.
pub struct Monitor<M, P, S> {
    state: ConnectivityState,
    retry: RetryScheduler,
    coordinator: AutoRepairCoordinator,
    procedure: RepairProcedure<M, P, S>,
    monitor: Arc<M>,
    events: EventBus,
    state_tx: watch::Sender<StateSnapshot>,
    commands: mpsc::Sender<Command>,
    observe_timeout: Duration,
    generation: Arc<AtomicU64>,
    repair_task: Option<RepairTask>,
}

impl<M, P, S> Monitor<M, P, S>
where
    M: PathMonitor,
    P: ReachabilityProbe,
    S: SettingsInspector,
{
    /// Validate `config`, start watching the path and spawn the actor.
    ///
    /// Fails if the configuration is invalid or the platform observer
    /// cannot be started. Must be called from within a tokio runtime.
    pub fn start(monitor: M, probe: P, settings: S, config: MonitorConfig) -> Result<MonitorHandle> {
        config.validate()?;

        let monitor = Arc::new(monitor);
        let watch = monitor.watch()?;

        let (commands, rx) = mpsc::channel(config.command_capacity);
        let (state_tx, state_rx) = watch::channel(StateSnapshot::default());
        let events = EventBus::with_capacity(config.event_capacity);
        let generation = Arc::new(AtomicU64::new(0));

        let actor = Monitor {
            state: ConnectivityState::new(),
            retry: RetryScheduler::new(config.retry_interval),
            coordinator: AutoRepairCoordinator::new(config.repair_threshold),
            procedure: RepairProcedure::new(
                Arc::clone(&monitor),
                Arc::new(probe),
                Arc::new(settings),
                RepairTimeouts::from(&config),
            ),
            monitor,
            events: events.clone(),
            state_tx,
            commands: commands.clone(),
            observe_timeout: config.permission_probe_timeout,
            generation: Arc::clone(&generation),
            repair_task: None,
        };

        let forwarder = tokio::spawn(forward(watch, commands.clone(), generation));
        let actor = tokio::spawn(actor.run(rx));
        info!(
            threshold = config.repair_threshold,
            retry_ms = config.retry_interval.as_millis() as u64,
            "monitor started"
        );

        Ok(MonitorHandle {
            commands,
            state: state_rx,
            events,
            actor,
            forwarder,
        })
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Observed {
                    snapshot,
                    origin,
                    generation,
                    reply,
                } => {
                    let current = self.generation.load(Ordering::Acquire);
                    match snapshot {
                        Some(_) if origin != Origin::Platform && generation != current => {
                            debug!(?origin, generation, current, "stale observation dropped");
                        }
                        Some(snapshot) => self.on_observation(snapshot, origin),
                        None => debug!(?origin, "no observation"),
                    }
                    self.publish_state();
                    if let Some(reply) = reply {
                        let _ = reply.send(self.state_tx.borrow().clone());
                    }
                }
                Command::CheckHealth(reply) => self.spawn_observation(Origin::HealthCheck, Some(reply)),
                Command::RepairFinished(attempt) => {
                    self.on_repair_finished(attempt);
                    self.publish_state();
                }
                Command::RepairNow(reply) => {
                    let started = match self.coordinator.request() {
                        Escalation::Repair(mode) => {
                            self.start_repair(mode);
                            true
                        }
                        _ => false,
                    };
                    self.publish_state();
                    let _ = reply.send(started);
                }
                Command::Shutdown => break,
            }
        }
        self.retry.stop();
        info!("monitor stopped");
    }

    fn on_observation(&mut self, snapshot: PathSnapshot, origin: Origin) {
        let previous = self.state.status();
        let classification = classify(&snapshot, previous);
        debug!(
            ?origin,
            satisfied = snapshot.satisfied,
            available = ?snapshot.available,
            used = ?snapshot.used,
            status = %classification.status,
            "classified"
        );

        let kind = self.state.apply(classification);
        let status = self.state.status();
        let failures = self.state.consecutive_failures();

        match kind {
            TransitionKind::Recovered => info!(%status, "connectivity recovered"),
            TransitionKind::Regressed => info!(
                %status,
                reason = self.state.last_failure_reason().unwrap_or_default(),
                "connectivity lost"
            ),
            TransitionKind::StillDown => debug!(%status, failures, "still disconnected"),
            TransitionKind::Changed => info!(%status, connection = ?self.state.connection_type(), "path changed"),
            TransitionKind::NoChange => {}
        }

        if kind.is_change() {
            self.events.emit(MonitorEvent::StatusChanged {
                status,
                connection_type: self.state.connection_type(),
                is_connected: self.state.is_connected(),
            });
        }

        match kind {
            TransitionKind::Recovered => {
                self.retry.stop();
                self.coordinator.reset();
            }
            TransitionKind::Regressed | TransitionKind::StillDown => {
                let entered_denial = status.is_denied() && status != previous;
                match self.coordinator.on_regression(failures, status, entered_denial) {
                    Escalation::Repair(mode) => self.start_repair(mode),
                    Escalation::Wait => self.ensure_retry(),
                    Escalation::Busy => {}
                }
            }
            TransitionKind::Changed | TransitionKind::NoChange => {}
        }
    }

    fn on_repair_finished(&mut self, attempt: RepairAttempt) {
        self.coordinator.finish();
        self.repair_task = None;

        let event = attempt.to_event(self.state.status());
        info!(event = event.name(), succeeded = attempt.succeeded(), "repair reported");
        self.events.emit(event);

        if !self.state.is_connected() {
            self.ensure_retry();
        }
    }

    fn ensure_retry(&mut self) {
        let monitor = Arc::clone(&self.monitor);
        let commands = self.commands.clone();
        let generation = Arc::clone(&self.generation);
        let timeout = self.observe_timeout;

        self.retry.start(move || {
            let monitor = Arc::clone(&monitor);
            let commands = commands.clone();
            let generation = generation.load(Ordering::Acquire);
            async move {
                let snapshot = observe(&*monitor, timeout).await;
                let command = Command::Observed {
                    snapshot,
                    origin: Origin::Retry,
                    generation,
                    reply: None,
                };
                match commands.send(command).await {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(_) => ControlFlow::Break(()),
                }
            }
        });
    }

    fn spawn_observation(&self, origin: Origin, reply: Option<oneshot::Sender<StateSnapshot>>) {
        let monitor = Arc::clone(&self.monitor);
        let commands = self.commands.clone();
        let timeout = self.observe_timeout;
        let generation = self.generation.load(Ordering::Acquire);
        tokio::spawn(async move {
            let snapshot = observe(&*monitor, timeout).await;
            let _ = commands
                .send(Command::Observed {
                    snapshot,
                    origin,
                    generation,
                    reply,
                })
                .await;
        });
    }

    fn start_repair(&mut self, mode: RepairMode) {
        self.retry.stop();

        let procedure = self.procedure.clone();
        let commands = self.commands.clone();
        let status = self.state.status();

        let run = tokio::spawn(async move { procedure.run(mode, status).await });
        let run_abort = run.abort_handle();
        let supervisor = tokio::spawn(async move {
            let attempt = match run.await {
                Ok(attempt) => attempt,
                Err(e) if e.is_cancelled() => return,
                Err(e) => {
                    warn!(error = %e, "repair task failed");
                    RepairAttempt::aborted(mode, format!("repair task failed: {e}"))
                }
            };
            let _ = commands.send(Command::RepairFinished(attempt)).await;
        });
        self.repair_task = Some(RepairTask {
            run: run_abort,
            supervisor,
        });
    }

    fn publish_state(&self) {
        let mut snapshot = self.state.snapshot();
        snapshot.retrying = self.retry.is_running();
        snapshot.repairing = self.coordinator.is_repairing();
        self.state_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

impl<M, P, S> Drop for Monitor<M, P, S> {
    fn drop(&mut self) {
        if let Some(task) = self.repair_task.take() {
            task.abort();
        }
    }
}

/// One observation for a retry tick or health check; failures read as none.
async fn observe<M: PathMonitor>(monitor: &M, timeout: Duration) -> Option<PathSnapshot> {
    observe_once(monitor, timeout).await.unwrap_or_else(|e| {
        warn!(error = %e, "observation failed");
        None
    })
}

async fn forward<W: PathWatch>(
    mut watch: W,
    commands: mpsc::Sender<Command>,
    generation: Arc<AtomicU64>,
) {
    while let Some(snapshot) = watch.next().await {
        let command = Command::Observed {
            snapshot: Some(snapshot),
            origin: Origin::Platform,
            generation: generation.fetch_add(1, Ordering::AcqRel) + 1,
            reply: None,
        };
        if commands.send(command).await.is_err() {
            return;
        }
    }
    warn!("platform path watch ended");
}

/// Handle to a running monitor.
///
/// Gives read-only access to the state and the event stream. Dropping the
/// handle stops the monitor.
#[derive(Debug)]
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<StateSnapshot>,
    events: EventBus,
    actor: JoinHandle<()>,
    forwarder: JoinHandle<()>,
}

impl MonitorHandle {
    /// Current state.
    pub fn state(&self) -> StateSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<StateSnapshot> {
        self.state.clone()
    }

    /// Subscribe to monitor events.
    pub fn subscribe(&self) -> EventSubscriber {
        self.events.subscribe()
    }

    /// Returns true while the actor is running.
    pub fn is_running(&self) -> bool {
        !self.actor.is_finished()
    }

    /// Take a fresh observation and return the resulting state.
    ///
    /// Call this when the app returns to the foreground. If no observation
    /// arrives in time the current state is returned unchanged.
    pub async fn check_health(&self) -> Result<StateSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CheckHealth(reply)).await?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Start a full repair now.
    ///
    /// Returns `false` if a repair is already in flight.
    pub async fn repair_now(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RepairNow(reply)).await?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Stop the monitor and wait for the actor to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        self.forwarder.abort();
        // An already stopped actor is fine.
        let _ = self.commands.send(Command::Shutdown).await;
        match (&mut self.actor).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(Error::Io(std::io::Error::other(e))),
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).await.map_err(|_| Error::Closed)
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.forwarder.abort();
        self.actor.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::observer::ManualPathMonitor;
    use crate::monitor::path::InterfaceType;
    use crate::monitor::settings::Capability;
    use crate::monitor::status::DetailedStatus;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicBool, AtomicU32};

    struct OkProbe;

    impl ReachabilityProbe for OkProbe {
        async fn check(&self) -> Result<u16> {
            Ok(204)
        }
    }

    struct NoSettings;

    impl SettingsInspector for NoSettings {
        async fn wifi_ssid(&self) -> Capability<String> {
            Capability::Unavailable
        }

        async fn dns_servers(&self) -> Capability<Vec<IpAddr>> {
            Capability::Unavailable
        }
    }

    /// Probe that hangs and records when its request future is dropped.
    #[derive(Default)]
    struct HangingProbe {
        entered: AtomicBool,
        dropped: Arc<AtomicBool>,
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    impl ReachabilityProbe for Arc<HangingProbe> {
        async fn check(&self) -> Result<u16> {
            let _guard = SetOnDrop(Arc::clone(&self.dropped));
            self.entered.store(true, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    /// Platform whose one-shot watches deliver their snapshot late.
    #[derive(Clone)]
    struct LaggingMonitor {
        inner: ManualPathMonitor,
        lag: Duration,
        watches: Arc<AtomicU32>,
    }

    struct LaggingWatch {
        inner: <ManualPathMonitor as PathMonitor>::Watch,
        lag: Duration,
    }

    impl PathMonitor for LaggingMonitor {
        type Watch = LaggingWatch;

        fn watch(&self) -> Result<LaggingWatch> {
            // The first watch feeds the forwarder and is not delayed.
            let first = self.watches.fetch_add(1, Ordering::SeqCst) == 0;
            Ok(LaggingWatch {
                inner: self.inner.watch()?,
                lag: if first { Duration::ZERO } else { self.lag },
            })
        }
    }

    impl PathWatch for LaggingWatch {
        async fn next(&mut self) -> Option<PathSnapshot> {
            let snapshot = self.inner.next().await;
            tokio::time::sleep(self.lag).await;
            snapshot
        }
    }

    async fn wait_for_state(
        rx: &mut watch::Receiver<StateSnapshot>,
        pred: impl Fn(&StateSnapshot) -> bool,
    ) -> StateSnapshot {
        tokio::time::timeout(Duration::from_secs(30), rx.wait_for(|s| pred(s)))
            .await
            .expect("state timeout")
            .expect("monitor gone")
            .clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_follows_platform() {
        let platform = ManualPathMonitor::with_initial(PathSnapshot::through(InterfaceType::Wifi));
        let handle = Monitor::start(
            platform.clone(),
            OkProbe,
            NoSettings,
            MonitorConfig::default(),
        )
        .unwrap();
        let mut rx = handle.watch_state();

        let state = wait_for_state(&mut rx, |s| s.is_connected).await;
        assert_eq!(state.status, DetailedStatus::Connected);

        platform.publish(PathSnapshot::unsatisfied());
        let state = wait_for_state(&mut rx, |s| !s.is_connected).await;
        assert_eq!(state.consecutive_failures, 1);
        assert!(state.retrying);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_running_repair() {
        let platform = ManualPathMonitor::with_initial(PathSnapshot::unsatisfied());
        let probe = Arc::new(HangingProbe::default());
        let handle = Monitor::start(
            platform,
            Arc::clone(&probe),
            NoSettings,
            MonitorConfig::default().repair_threshold(100),
        )
        .unwrap();
        let mut rx = handle.watch_state();
        wait_for_state(&mut rx, |s| s.consecutive_failures == 1).await;

        assert!(handle.repair_now().await.unwrap());
        while !probe.entered.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!probe.dropped.load(Ordering::SeqCst));

        handle.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(probe.dropped.load(Ordering::SeqCst), "repair still running");
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_health_check_does_not_override_newer_update() {
        let platform = ManualPathMonitor::with_initial(PathSnapshot::through(InterfaceType::Wifi));
        let monitor = LaggingMonitor {
            inner: platform.clone(),
            lag: Duration::from_secs(1),
            watches: Arc::new(AtomicU32::new(0)),
        };
        let handle = Monitor::start(
            monitor,
            OkProbe,
            NoSettings,
            MonitorConfig::default()
                .repair_threshold(100)
                .retry_interval(Duration::from_secs(60)),
        )
        .unwrap();
        let mut rx = handle.watch_state();
        wait_for_state(&mut rx, |s| s.is_connected).await;

        // The health check captures "connected", then the link drops
        // before its observation is delivered.
        let (snap, ()) = tokio::join!(handle.check_health(), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            platform.publish(PathSnapshot::unsatisfied());
        });
        let snap = snap.unwrap();
        assert_eq!(snap.status, DetailedStatus::Disconnected);
        assert!(!snap.is_connected);
        assert_eq!(handle.state().status, DetailedStatus::Disconnected);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let err = Monitor::start(
            ManualPathMonitor::new(),
            OkProbe,
            NoSettings,
            MonitorConfig::default().repair_threshold(0),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_closed_handle_errors() {
        let handle = Monitor::start(
            ManualPathMonitor::new(),
            OkProbe,
            NoSettings,
            MonitorConfig::default(),
        )
        .unwrap();
        handle.actor.abort();
        tokio::task::yield_now().await;
        while handle.is_running() {
            tokio::task::yield_now().await;
        }
        assert!(matches!(handle.repair_now().await, Err(Error::Closed)));
    }
}
