//! Linux adapter tests against a fake sysfs/procfs tree.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use netmend::monitor::{
    ConnectionType, DetailedStatus, LinuxPathConfig, LinuxPathMonitor, Monitor, MonitorEvent,
    PathMonitor, observe_once,
};

use crate::common::{FakeProbe, FakeSettings, fast_config, wait_for_event};

const WAIT: Duration = Duration::from_secs(5);

struct FakeHost {
    dir: tempfile::TempDir,
}

impl FakeHost {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sys")).unwrap();
        fs::create_dir_all(dir.path().join("proc")).unwrap();
        let host = Self { dir };
        host.link("lo", 772, false);
        host.default_routes(&[]);
        host
    }

    fn config(&self) -> LinuxPathConfig {
        LinuxPathConfig::default()
            .sysfs_net(self.dir.path().join("sys"))
            .procfs_net(self.dir.path().join("proc"))
            .poll(Duration::from_millis(20))
    }

    fn link(&self, name: &str, arphrd: u16, wireless: bool) {
        let dir = self.dir.path().join("sys").join(name);
        fs::create_dir_all(&dir).unwrap();
        replace(&dir.join("type"), &format!("{arphrd}\n"));
        replace(&dir.join("operstate"), "up\n");
        replace(&dir.join("carrier"), "1\n");
        fs::create_dir_all(dir.join("device")).unwrap();
        if wireless {
            fs::create_dir_all(dir.join("wireless")).unwrap();
        }
    }

    fn default_routes(&self, ifaces: &[&str]) {
        let mut table = String::from("Iface\tDestination\tGateway\tFlags\tRefCnt\tUse\tMetric\tMask\n");
        for iface in ifaces {
            table.push_str(&format!("{iface}\t00000000\t0100A8C0\t0003\t0\t0\t0\t00000000\n"));
        }
        replace(&self.proc().join("route"), &table);
    }

    fn proc(&self) -> PathBuf {
        self.dir.path().join("proc")
    }
}

fn replace(path: &Path, content: &str) {
    let tmp = path.with_extension("new");
    fs::write(&tmp, content).unwrap();
    fs::rename(&tmp, path).unwrap();
}

#[tokio::test]
async fn test_observe_once_reads_tree() {
    let host = FakeHost::new();
    host.link("wwan0", 519, false);
    host.default_routes(&["wwan0"]);

    let monitor = LinuxPathMonitor::new(host.config().metered("wwan0"));
    let snapshot = observe_once(&monitor, WAIT).await.unwrap().unwrap();
    assert!(snapshot.satisfied);
    assert!(snapshot.constrained);
    assert_eq!(snapshot, monitor.snapshot().unwrap());
}

#[tokio::test]
async fn test_engine_follows_route_changes() {
    let host = FakeHost::new();
    host.link("wlan0", 1, true);
    host.link("eth0", 1, false);
    host.default_routes(&["wlan0"]);

    let monitor = LinuxPathMonitor::new(host.config());
    let handle = Monitor::start(
        monitor,
        FakeProbe::status(204),
        FakeSettings,
        fast_config().repair_threshold(100),
    )
    .unwrap();
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

    host.default_routes(&[]);
    let event = wait_for_event(&mut events, WAIT, |_| true).await.unwrap();
    assert!(matches!(
        event,
        MonitorEvent::StatusChanged {
            status: DetailedStatus::Disconnected,
            is_connected: false,
            ..
        }
    ));

    // Route moves to the wired uplink while WiFi stays up and idle.
    host.default_routes(&["eth0"]);
    let event = wait_for_event(&mut events, WAIT, |e| {
        matches!(e, MonitorEvent::StatusChanged { status, .. } if *status != DetailedStatus::Disconnected)
    })
    .await
    .unwrap();
    assert!(matches!(
        event,
        MonitorEvent::StatusChanged {
            status: DetailedStatus::WifiDenied,
            connection_type: ConnectionType::Ethernet,
            ..
        }
    ));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_sysfs_fails_start() {
    let config = LinuxPathConfig::default()
        .sysfs_net("/nonexistent/netmend/sys")
        .poll(Duration::from_millis(20));
    let err = Monitor::start(
        LinuxPathMonitor::new(config.clone()),
        FakeProbe::status(204),
        FakeSettings,
        fast_config(),
    )
    .unwrap_err();
    assert!(err.is_fatal());
    assert!(LinuxPathMonitor::new(config).watch().is_err());
}
