//! Default route discovery from procfs.
//!
//! Reads `/proc/net/route` and `/proc/net/ipv6_route` and reports which
//! interfaces carry a usable default route. No netlink dump is needed for
//! this; the kernel keeps both tables current.

use std::collections::BTreeSet;
use std::io;
use std::path::Path;

/// Route is usable.
const RTF_UP: u32 = 0x0001;

/// Interfaces with an IPv4 default route, from `/proc/net/route` content.
///
/// Columns: `Iface Destination Gateway Flags RefCnt Use Metric Mask ...`,
/// with destination, flags and mask in hex.
pub fn parse_ipv4_default_routes(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 8 {
                return None;
            }
            let dest = u32::from_str_radix(cols[1], 16).ok()?;
            let flags = u32::from_str_radix(cols[3], 16).ok()?;
            let mask = u32::from_str_radix(cols[7], 16).ok()?;
            (dest == 0 && mask == 0 && flags & RTF_UP != 0).then(|| cols[0].to_string())
        })
        .collect()
}

/// Interfaces with an IPv6 default route, from `/proc/net/ipv6_route` content.
///
/// Columns: `dest dest_plen src src_plen nexthop metric refcnt use flags iface`,
/// no header. The loopback reject route is ignored.
pub fn parse_ipv6_default_routes(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 10 {
                return None;
            }
            let is_default = cols[0].bytes().all(|b| b == b'0') && cols[1] == "00";
            let flags = u32::from_str_radix(cols[8], 16).ok()?;
            let iface = cols[9];
            (is_default && flags & RTF_UP != 0 && iface != "lo").then(|| iface.to_string())
        })
        .collect()
}

/// Interfaces with an IPv4 or IPv6 default route under `procfs_net`.
///
/// A missing table counts as empty (IPv6 may be disabled). Other read
/// errors are returned.
pub fn default_route_interfaces(procfs_net: &Path) -> io::Result<BTreeSet<String>> {
    let mut ifaces = BTreeSet::new();
    if let Some(content) = read_optional(&procfs_net.join("route"))? {
        ifaces.extend(parse_ipv4_default_routes(&content));
    }
    if let Some(content) = read_optional(&procfs_net.join("ipv6_route"))? {
        ifaces.extend(parse_ipv6_default_routes(&content));
    }
    Ok(ifaces)
}

fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
