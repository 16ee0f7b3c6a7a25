//! Common test utilities for integration tests.
//!
//! Provides a scriptable reachability probe, fixed settings, short timing
//! and helpers for waiting on monitor events.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use netmend::monitor::{
    Capability, EventSubscriber, InterfaceSet, InterfaceType, MonitorConfig, MonitorEvent,
    PathSnapshot, ReachabilityProbe, SettingsInspector, StateSnapshot,
};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Status(u16),
    Hang,
    Panic,
}

/// Reachability probe with a fixed answer that counts its calls.
#[derive(Debug, Clone)]
pub struct FakeProbe {
    behavior: Behavior,
    calls: Arc<AtomicU32>,
}

impl FakeProbe {
    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Answer every request with `code`.
    pub fn status(code: u16) -> Self {
        Self::with(Behavior::Status(code))
    }

    /// Never answer.
    pub fn hang() -> Self {
        Self::with(Behavior::Hang)
    }

    /// Panic on every request.
    pub fn panicking() -> Self {
        Self::with(Behavior::Panic)
    }

    /// Number of requests issued.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReachabilityProbe for FakeProbe {
    async fn check(&self) -> netmend::Result<u16> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Status(code) => Ok(code),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(200)
            }
            Behavior::Panic => panic!("probe exploded"),
        }
    }
}

/// Settings that report a WiFi network and one DNS server.
#[derive(Debug, Clone, Copy)]
pub struct FakeSettings;

impl SettingsInspector for FakeSettings {
    async fn wifi_ssid(&self) -> Capability<String> {
        Capability::Available("test-net".to_string())
    }

    async fn dns_servers(&self) -> Capability<Vec<IpAddr>> {
        Capability::Available(vec![IpAddr::from([10, 0, 0, 53])])
    }
}

/// Monitor settings scaled down for tests.
pub fn fast_config() -> MonitorConfig {
    MonitorConfig::default()
        .retry_interval(Duration::from_millis(100))
        .permission_probe_timeout(Duration::from_millis(500))
        .settings_timeout(Duration::from_millis(100))
        .reachability_timeout(Duration::from_secs(1))
        .repair_budget(Duration::from_secs(2))
}

pub fn connected() -> PathSnapshot {
    PathSnapshot::through(InterfaceType::Wifi)
}

pub fn offline() -> PathSnapshot {
    PathSnapshot::unsatisfied()
}

pub fn wifi_denied() -> PathSnapshot {
    PathSnapshot::unsatisfied()
        .satisfied(true)
        .available([InterfaceType::Wifi])
        .used(InterfaceSet::empty())
}

/// Wait for the first event matching `pred`, skipping others.
pub async fn wait_for_event(
    events: &mut EventSubscriber,
    within: Duration,
    pred: impl Fn(&MonitorEvent) -> bool,
) -> Option<MonitorEvent> {
    tokio::time::timeout(within, async {
        while let Some(event) = events.recv().await {
            if pred(&event) {
                return Some(event);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Collect every event published during `window`.
pub async fn collect_events(events: &mut EventSubscriber, window: Duration) -> Vec<MonitorEvent> {
    let mut out = Vec::new();
    let _ = tokio::time::timeout(window, async {
        while let Some(event) = events.recv().await {
            out.push(event);
        }
    })
    .await;
    out
}

/// Wait until the published state matches `pred`.
pub async fn wait_for_state(
    state: &mut watch::Receiver<StateSnapshot>,
    within: Duration,
    pred: impl Fn(&StateSnapshot) -> bool,
) -> StateSnapshot {
    tokio::time::timeout(within, state.wait_for(|s| pred(s)))
        .await
        .expect("timed out waiting for state")
        .expect("monitor stopped")
        .clone()
}
