//! netmend status - classify the current path.

use clap::Args;
use netmend::monitor::{
    Capability, Config, DetailedStatus, LinuxPathMonitor, SettingsInspector, SystemSettings,
    classify,
};
use serde_json::json;

#[derive(Args)]
pub struct StatusCmd {
    /// Skip the WiFi and DNS settings queries.
    #[arg(long)]
    no_settings: bool,
}

impl StatusCmd {
    pub async fn run(&self, config: Config, json: bool) -> anyhow::Result<()> {
        let settings = SystemSettings::new().sysfs_net(&config.platform.sysfs_net);
        let monitor = LinuxPathMonitor::new(config.platform);
        let snapshot = monitor.snapshot()?;
        let classification = classify(&snapshot, DetailedStatus::Unknown);

        let (ssid, dns) = if self.no_settings {
            (Capability::Unavailable, Capability::Unavailable)
        } else {
            tokio::join!(settings.wifi_ssid(), settings.dns_servers())
        };

        if json {
            let out = json!({
                "snapshot": snapshot,
                "classification": classification,
                "settings": {
                    "wifi_ssid": ssid,
                    "dns_servers": dns,
                },
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }

        println!("status:     {}", classification.status);
        println!("connection: {}", classification.connection_type);
        if let Some(reason) = &classification.reason {
            println!("reason:     {reason}");
        }
        println!("satisfied:  {}", snapshot.satisfied);
        println!("limited:    {}", snapshot.constrained);
        println!("available:  {}", join(snapshot.available.iter()));
        println!("used:       {}", join(snapshot.used.iter()));
        if !self.no_settings {
            match ssid {
                Capability::Available(ssid) => println!("wifi ssid:  {ssid}"),
                Capability::Unavailable => println!("wifi ssid:  unavailable"),
            }
            match dns {
                Capability::Available(servers) => println!("dns:        {}", join(servers.iter())),
                Capability::Unavailable => println!("dns:        unavailable"),
            }
        }
        Ok(())
    }
}

fn join<T: std::fmt::Display>(items: impl Iterator<Item = T>) -> String {
    let out = items.map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
    if out.is_empty() { "-".to_string() } else { out }
}
