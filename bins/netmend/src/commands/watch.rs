//! netmend watch - run the monitor and print its events.

use std::time::Duration;

use clap::Args;
use netmend::monitor::{
    Config, HttpProbe, LinuxPathMonitor, Monitor, MonitorEvent, StateSnapshot, SystemSettings,
};

#[derive(Args)]
pub struct WatchCmd {
    /// Poll the interface tables every MS milliseconds instead of
    /// listening for netlink notifications.
    #[arg(long, value_name = "MS")]
    poll: Option<u64>,

    /// Override the failure count that starts a full repair.
    #[arg(long, value_name = "N")]
    threshold: Option<u32>,
}

impl WatchCmd {
    pub async fn run(&self, mut config: Config, json: bool) -> anyhow::Result<()> {
        if let Some(ms) = self.poll {
            config.platform = config.platform.poll(Duration::from_millis(ms));
        }
        if let Some(threshold) = self.threshold {
            config.monitor.repair_threshold = threshold;
        }
        config.validate()?;

        let probe = HttpProbe::new(&config.monitor.probe_url, config.monitor.reachability_timeout)?;
        let settings = SystemSettings::new().sysfs_net(&config.platform.sysfs_net);
        let handle = Monitor::start(
            LinuxPathMonitor::new(config.platform),
            probe,
            settings,
            config.monitor,
        )?;
        let mut events = handle.subscribe();

        if !json {
            println!("Watching connectivity (Ctrl+C to stop)...");
        }

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => {
                    let Some(event) = event else { break };
                    print_event(&event, &handle.state(), json)?;
                }
            }
        }

        handle.shutdown().await?;
        Ok(())
    }
}

fn print_event(event: &MonitorEvent, state: &StateSnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        MonitorEvent::StatusChanged {
            status,
            connection_type,
            ..
        } => {
            print!("status: {status} via {connection_type}");
            if state.consecutive_failures > 0 {
                print!(" (failures: {})", state.consecutive_failures);
            }
            if let Some(reason) = &state.last_failure_reason {
                print!(" - {reason}");
            }
            println!();
        }
        MonitorEvent::RepairAttempted {
            success, message, ..
        } => {
            let result = if *success { "succeeded" } else { "failed" };
            println!("repair {result}: {message}");
        }
        MonitorEvent::ManualFixNeeded { title, message } => {
            println!("{title}");
            println!("{message}");
        }
        MonitorEvent::PermissionFixNeeded {
            title,
            message,
            interface,
        } => {
            println!("{title} [{interface}]");
            println!("{message}");
        }
    }
    Ok(())
}
