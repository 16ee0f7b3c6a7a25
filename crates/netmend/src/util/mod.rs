//! Shared helpers for reading Linux network state.

pub mod resolv;
pub mod route;
pub mod sysfs;

pub use resolv::parse_nameservers;
pub use route::{default_route_interfaces, parse_ipv4_default_routes, parse_ipv6_default_routes};
pub use sysfs::{SysfsInterface, read_interfaces};
