//! netmend command implementations.

pub mod repair;
pub mod status;
pub mod watch;
