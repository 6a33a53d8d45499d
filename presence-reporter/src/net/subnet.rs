//! Netmask to CIDR conversion

use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;
use tracing::{debug, warn};

/// Smallest prefix still considered practical to sweep (a /16 is 65534 hosts)
pub const MIN_PREFIX_LEN: u8 = 16;
/// Longest prefix that still has a host address besides network and broadcast
pub const MAX_PREFIX_LEN: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal netmask value {0:#010x}")]
pub struct IllegalNetmask(pub u32);

/// Prefix length of a netmask given as a host-order integer.
///
/// `0` and `0xFFFFFFFF` do not describe a subnet and are rejected.
/// `32 - round(log2(0xFFFFFFFF - netmask))`, so `0xFFFFFFFE` comes out as 32.
pub fn prefix_len(netmask: u32) -> Result<u8, IllegalNetmask> {
    if netmask == 0 || netmask == u32::MAX {
        return Err(IllegalNetmask(netmask));
    }
    let host_bits = f64::from(u32::MAX - netmask).log2().round() as u8;
    Ok(32 - host_bits)
}

/// An IPv4 network in CIDR form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    pub network: Ipv4Addr,
    pub prefix: u8,
}

impl Subnet {
    /// Convert a routing-table (network, netmask) pair, skipping oversized
    /// or illegal masks with a warning.
    pub fn from_route(network: Ipv4Addr, netmask: u32) -> Option<Self> {
        let prefix = match prefix_len(netmask) {
            Ok(p) => p,
            Err(e) => {
                warn!("{}: {}, skipping", network, e);
                return None;
            }
        };
        let subnet = Subnet { network, prefix };
        if prefix < MIN_PREFIX_LEN {
            warn!("{} is too big. skipping", subnet);
            return None;
        }
        if prefix > MAX_PREFIX_LEN {
            debug!("{} has no hosts to sweep, skipping", subnet);
            return None;
        }
        Some(subnet)
    }

    fn mask(&self) -> u32 {
        match self.prefix {
            0 => 0,
            p => u32::MAX << (32 - u32::from(p.min(32))),
        }
    }

    /// Addresses to probe: every host address, excluding network and
    /// broadcast addresses when the subnet has room for them.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> {
        let mask = self.mask();
        let base = u32::from(self.network) & mask;
        let last = base | !mask;
        let (first, last) = if self.prefix >= 31 {
            (base, last)
        } else {
            (base + 1, last - 1)
        };
        (first..=last).map(Ipv4Addr::from)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}
