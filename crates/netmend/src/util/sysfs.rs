//! Interface attributes from `/sys/class/net`.

use std::io;
use std::path::Path;

/// The attributes of one interface the path adapter cares about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SysfsInterface {
    /// Interface name.
    pub name: String,
    /// `operstate` (`up`, `down`, `unknown`, `dormant`, ...).
    pub operstate: String,
    /// `carrier` is 1. Reading it fails on down interfaces; that reads as false.
    pub carrier: bool,
    /// ARPHRD type from `type`.
    pub arphrd: u16,
    /// Has a `wireless` directory or a `phy80211` link.
    pub wireless: bool,
    /// Has a `device` link (backed by real hardware).
    pub has_device: bool,
}

impl SysfsInterface {
    /// Returns true if the interface can carry traffic.
    ///
    /// Drivers that do not report operstate leave it `unknown`; those count
    /// when they have carrier.
    pub fn is_up(&self) -> bool {
        match self.operstate.as_str() {
            "up" => true,
            "unknown" => self.carrier,
            _ => false,
        }
    }
}

/// Read every interface under `sysfs_net`, sorted by name.
///
/// Entries whose `type` cannot be read (vanished mid-scan) are skipped.
pub fn read_interfaces(sysfs_net: &Path) -> io::Result<Vec<SysfsInterface>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(sysfs_net)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let dir = entry.path();

        let Some(arphrd) = read_attr(&dir, "type").and_then(|t| t.parse::<u16>().ok()) else {
            continue;
        };

        out.push(SysfsInterface {
            operstate: read_attr(&dir, "operstate").unwrap_or_else(|| "unknown".to_string()),
            carrier: read_attr(&dir, "carrier").is_some_and(|c| c == "1"),
            arphrd,
            wireless: dir.join("wireless").exists() || dir.join("phy80211").exists(),
            has_device: dir.join("device").exists(),
            name,
        });
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

fn read_attr(dir: &Path, attr: &str) -> Option<String> {
    std::fs::read_to_string(dir.join(attr))
        .ok()
        .map(|s| s.trim().to_string())
}
