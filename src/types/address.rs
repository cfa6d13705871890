//! Resolved addresses and the host validity predicate.

use crate::error::{LookupError, LookupResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// An IP address together with how it was learned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// The address itself.
    pub ip: IpAddr,
    /// `true` when read from the OS neighbor table, `false` when a probe
    /// just received a reply from it.
    pub from_cache: bool,
}

impl Address {
    /// An address read passively from the neighbor table.
    pub fn cached(ip: impl Into<IpAddr>) -> Self {
        Self {
            ip: ip.into(),
            from_cache: true,
        }
    }

    /// An address that answered an active probe.
    pub fn fresh(ip: impl Into<IpAddr>) -> Self {
        Self {
            ip: ip.into(),
            from_cache: false,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ip)
    }
}

/// Decide whether a candidate address is worth probing.
///
/// IPv4 addresses must be private, and not loopback, multicast, unspecified,
/// or the first/last address of their /24 block. Non-IPv4 addresses are never
/// probed yet.
pub fn is_valid_host(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_valid_host_v4(v4),
        IpAddr::V6(_) => false,
    }
}

fn is_valid_host_v4(ip: Ipv4Addr) -> bool {
    let last = ip.octets()[3];
    !ip.is_loopback()
        && !ip.is_multicast()
        && !ip.is_unspecified()
        && ip.is_private()
        && last != 0x00
        && last != 0xff
}

/// Parse a human-readable duration such as `"5s"`, `"150ms"` or `"1m30s"`.
pub fn parse_duration(s: &str) -> LookupResult<Duration> {
    humantime::parse_duration(s.trim())
        .map_err(|e| LookupError::Parse(format!("malformed or invalid duration {:?}: {}", s, e)))
}
