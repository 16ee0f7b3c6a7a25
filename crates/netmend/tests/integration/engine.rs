//! Engine tests: classification, retry and repair escalation end to end.
//!
//! All tests run on a paused clock; timers advance only when every task
//! is idle, so the retry and repair timing is deterministic.

use std::time::Duration;

use netmend::monitor::{
    ConnectionType, DeniedInterface, DetailedStatus, ManualPathMonitor, Monitor, MonitorEvent,
    MonitorHandle,
};

use crate::common::{
    FakeProbe, FakeSettings, collect_events, connected, fast_config, offline, wait_for_event,
    wait_for_state, wifi_denied,
};

const WAIT: Duration = Duration::from_secs(30);

fn start(platform: &ManualPathMonitor, probe: &FakeProbe, threshold: u32) -> MonitorHandle {
    Monitor::start(
        platform.clone(),
        probe.clone(),
        FakeSettings,
        fast_config().repair_threshold(threshold),
    )
    .unwrap()
}

fn is_manual_fix(event: &MonitorEvent) -> bool {
    matches!(event, MonitorEvent::ManualFixNeeded { .. })
}

#[tokio::test(start_paused = true)]
async fn test_status_changed_on_every_transition() {
    let platform = ManualPathMonitor::with_initial(connected());
    let probe = FakeProbe::status(204);
    let handle = start(&platform, &probe, 10);
    let mut events = handle.subscribe();

    let event = wait_for_event(&mut events, WAIT, |_| true).await.unwrap();
    assert_eq!(
        event,
        MonitorEvent::StatusChanged {
            status: DetailedStatus::Connected,
            connection_type: ConnectionType::Wifi,
            is_connected: true,
        }
    );

    // Same path again: no change, no event.
    platform.publish(connected());
    platform.publish(offline());
    let event = wait_for_event(&mut events, WAIT, |_| true).await.unwrap();
    assert!(matches!(
        event,
        MonitorEvent::StatusChanged {
            status: DetailedStatus::Disconnected,
            is_connected: false,
            ..
        }
    ));

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_streak_grows_with_retries_and_resets_on_recovery() {
    let platform = ManualPathMonitor::with_initial(connected());
    let probe = FakeProbe::status(204);
    let handle = start(&platform, &probe, 10);
    let mut state = handle.watch_state();

    wait_for_state(&mut state, WAIT, |s| s.is_connected).await;
    platform.publish(offline());

    let snap = wait_for_state(&mut state, WAIT, |s| s.consecutive_failures >= 4).await;
    assert!(!snap.is_connected);
    assert!(snap.retrying);
    assert_eq!(snap.last_failure_reason.as_deref(), Some("path not satisfied"));
    assert_eq!(probe.calls(), 0);

    platform.publish(connected());
    let snap = wait_for_state(&mut state, WAIT, |s| s.is_connected).await;
    assert_eq!(snap.consecutive_failures, 0);
    assert_eq!(snap.last_failure_reason, None);
    assert!(!snap.retrying, "recovery stops the retry timer");

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reachable_probe_reports_success() {
    let platform = ManualPathMonitor::with_initial(connected());
    let probe = FakeProbe::status(200);
    let handle = start(&platform, &probe, 3);
    let mut events = handle.subscribe();

    platform.publish(offline());
    let event = wait_for_event(&mut events, WAIT, |e| e.is_repair_outcome())
        .await
        .unwrap();
    match event {
        MonitorEvent::RepairAttempted {
            success, status, ..
        } => {
            assert!(success);
            assert_eq!(status, DetailedStatus::Disconnected);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(probe.calls(), 1);

    // Less than `threshold` retry ticks: no further outcome.
    let later = collect_events(&mut events, Duration::from_millis(250)).await;
    assert!(!later.iter().any(is_manual_fix));
    assert!(!later.iter().any(MonitorEvent::is_repair_outcome));

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_needs_manual_fix_once_and_keeps_retrying() {
    let platform = ManualPathMonitor::with_initial(connected());
    let probe = FakeProbe::hang();
    let handle = start(&platform, &probe, 3);
    let mut events = handle.subscribe();
    let mut state = handle.watch_state();

    platform.publish(offline());
    let event = wait_for_event(&mut events, WAIT, |e| e.is_repair_outcome())
        .await
        .unwrap();
    assert!(is_manual_fix(&event), "unexpected outcome {event:?}");

    let snap = wait_for_state(&mut state, WAIT, |s| !s.repairing).await;
    assert!(snap.retrying);
    assert_eq!(snap.consecutive_failures, 3);

    let later = collect_events(&mut events, Duration::from_millis(250)).await;
    assert!(!later.iter().any(MonitorEvent::is_repair_outcome));
    // Retry ticks kept observing.
    assert!(later.iter().any(|e| matches!(e, MonitorEvent::StatusChanged { .. })));
    assert_eq!(probe.calls(), 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_repair_in_flight() {
    let platform = ManualPathMonitor::with_initial(connected());
    let probe = FakeProbe::hang();
    let handle = start(&platform, &probe, 1);
    let mut state = handle.watch_state();
    let mut events = handle.subscribe();

    wait_for_state(&mut state, WAIT, |s| s.is_connected).await;
    platform.publish(offline());
    platform.publish(offline());
    platform.publish(offline());

    let snap = wait_for_state(&mut state, WAIT, |s| s.consecutive_failures == 3).await;
    assert!(snap.repairing);
    assert!(!handle.repair_now().await.unwrap());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(probe.calls(), 1);

    let event = wait_for_event(&mut events, WAIT, |e| e.is_repair_outcome())
        .await
        .unwrap();
    assert!(is_manual_fix(&event));
    assert_eq!(probe.calls(), 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_denial_triggers_permission_fix_below_threshold() {
    let platform = ManualPathMonitor::with_initial(connected());
    let probe = FakeProbe::status(204);
    let handle = start(&platform, &probe, 3);
    let mut events = handle.subscribe();

    platform.publish(wifi_denied());
    let event = wait_for_event(&mut events, WAIT, |e| e.is_repair_outcome())
        .await
        .unwrap();
    match event {
        MonitorEvent::PermissionFixNeeded {
            title, interface, ..
        } => {
            assert_eq!(interface, DeniedInterface::Wifi);
            assert!(title.contains("Wi-Fi"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    // The lightweight path stops once the denial is confirmed.
    assert_eq!(probe.calls(), 0);
    assert_eq!(handle.state().status, DetailedStatus::WifiDenied);
    assert_eq!(handle.state().consecutive_failures, 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_panicking_repair_returns_to_idle() {
    let platform = ManualPathMonitor::with_initial(offline());
    let probe = FakeProbe::panicking();
    let handle = start(&platform, &probe, 10);
    let mut events = handle.subscribe();
    let mut state = handle.watch_state();

    wait_for_state(&mut state, WAIT, |s| s.consecutive_failures == 1).await;
    assert!(handle.repair_now().await.unwrap());

    let event = wait_for_event(&mut events, WAIT, |e| e.is_repair_outcome())
        .await
        .unwrap();
    assert!(is_manual_fix(&event));

    wait_for_state(&mut state, WAIT, |s| !s.repairing).await;
    assert!(handle.repair_now().await.unwrap(), "coordinator is idle again");
    assert!(handle.is_running());

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_check_health_takes_fresh_observation() {
    let platform = ManualPathMonitor::with_initial(connected());
    let probe = FakeProbe::status(204);
    let handle = start(&platform, &probe, 10);
    let mut state = handle.watch_state();
    wait_for_state(&mut state, WAIT, |s| s.is_connected).await;

    // The callback was missed while suspended.
    platform.set_current(offline());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(handle.state().is_connected);

    let snap = handle.check_health().await.unwrap();
    assert!(!snap.is_connected);
    assert_eq!(snap.status, DetailedStatus::Disconnected);
    assert_eq!(snap.consecutive_failures, 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_check_health_without_observation_keeps_state() {
    let platform = ManualPathMonitor::with_initial(connected());
    let probe = FakeProbe::status(204);
    let handle = start(&platform, &probe, 10);
    let mut state = handle.watch_state();
    wait_for_state(&mut state, WAIT, |s| s.is_connected).await;

    platform.set_silent(true);
    let snap = handle.check_health().await.unwrap();
    assert!(snap.is_connected);
    assert_eq!(snap.status, DetailedStatus::Connected);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_is_connected_matches_status() {
    let platform = ManualPathMonitor::with_initial(connected());
    let probe = FakeProbe::status(204);
    let handle = start(&platform, &probe, 100);
    let mut state = handle.watch_state();

    for snapshot in [
        offline(),
        connected().constrained(true),
        wifi_denied(),
        connected(),
    ] {
        platform.publish(snapshot);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let snap = state.borrow_and_update().clone();
        assert_eq!(
            snap.is_connected,
            matches!(
                snap.status,
                DetailedStatus::Connected | DetailedStatus::ConnectedLimited
            )
        );
    }
    assert_eq!(handle.state().status, DetailedStatus::Connected);

    handle.shutdown().await.unwrap();
}
