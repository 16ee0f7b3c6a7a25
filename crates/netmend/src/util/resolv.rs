//! `resolv.conf` parsing.

use std::net::IpAddr;

/// Extract nameserver addresses from `resolv.conf` content.
///
/// Comments, other directives and unparseable addresses are skipped.
/// IPv6 zone suffixes (`fe80::1%eth0`) are dropped.
pub fn parse_nameservers(content: &str) -> Vec<IpAddr> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            if parts.next()? != "nameserver" {
                return None;
            }
            let addr = parts.next()?;
            let addr = addr.split('%').next().unwrap_or(addr);
            addr.parse().ok()
        })
        .collect()
}
