//! netmend repair - run the repair procedure once.

use std::sync::Arc;

use clap::Args;
use netmend::monitor::repair::RepairTimeouts;
use netmend::monitor::{
    Config, DetailedStatus, HttpProbe, LinuxPathMonitor, RepairMode, RepairProcedure,
    SystemSettings, classify,
};
use serde_json::json;

#[derive(Args)]
pub struct RepairCmd {}

impl RepairCmd {
    pub async fn run(&self, config: Config, json: bool) -> anyhow::Result<()> {
        config.validate()?;

        let settings = SystemSettings::new().sysfs_net(&config.platform.sysfs_net);
        let monitor = LinuxPathMonitor::new(config.platform);
        let status = classify(&monitor.snapshot()?, DetailedStatus::Unknown).status;
        let probe = HttpProbe::new(&config.monitor.probe_url, config.monitor.reachability_timeout)?;

        let procedure = RepairProcedure::new(
            Arc::new(monitor),
            Arc::new(probe),
            Arc::new(settings),
            RepairTimeouts::from(&config.monitor),
        );
        let attempt = procedure.run(RepairMode::Full, status).await;
        let event = attempt.to_event(status);

        if json {
            let out = json!({
                "attempt": attempt,
                "event": event,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            println!("status before repair: {status}");
            for step in &attempt.steps {
                println!(
                    "  {:<20} {:<10} {:>6}ms  {}",
                    format!("{:?}", step.step),
                    format!("{:?}", step.status),
                    step.elapsed.as_millis(),
                    step.detail
                );
            }
            match &event {
                netmend::MonitorEvent::RepairAttempted { message, .. } => {
                    println!("repair succeeded: {message}");
                }
                netmend::MonitorEvent::ManualFixNeeded { title, message }
                | netmend::MonitorEvent::PermissionFixNeeded { title, message, .. } => {
                    println!("{title}");
                    println!("{message}");
                }
                netmend::MonitorEvent::StatusChanged { .. } => {}
            }
        }

        if !attempt.succeeded() {
            std::process::exit(2);
        }
        Ok(())
    }
}
