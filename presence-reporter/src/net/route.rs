//! Routing table snapshots
//!
//! On Linux the table is read from `/proc/net/route`; interface addresses come
//! from the interface enumeration so each entry carries the local address the
//! route leaves from.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use tracing::debug;

use super::interfaces;
use crate::error::ProbeError;

const RTF_UP: u32 = 0x0001;

/// One IPv4 route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub network: Ipv4Addr,
    /// Host-order netmask, `0xFFFFFF00` for a /24
    pub netmask: u32,
    pub interface: String,
    /// Local address of `interface` (`0.0.0.0` when unknown)
    pub interface_address: Ipv4Addr,
}

impl RouteEntry {
    pub fn new(network: Ipv4Addr, netmask: u32, interface: &str, interface_address: Ipv4Addr) -> Self {
        Self {
            network,
            netmask,
            interface: interface.to_string(),
            interface_address,
        }
    }

    pub fn is_default(&self) -> bool {
        self.network.is_unspecified()
    }
}

/// Ordered routes plus the interface the host sends default traffic through
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    pub entries: Vec<RouteEntry>,
    pub primary_interface: Option<String>,
}

impl RoutingTable {
    /// Build a table, taking the primary interface from the first default route
    pub fn from_entries(entries: Vec<RouteEntry>) -> Self {
        let primary_interface = entries
            .iter()
            .find(|e| e.is_default())
            .map(|e| e.interface.clone());
        Self {
            entries,
            primary_interface,
        }
    }
}

/// Source of routing table snapshots
pub trait RouteSource: Send + Sync {
    fn snapshot(&self) -> Result<RoutingTable, ProbeError>;
}

/// Reads the kernel routing table from procfs
#[derive(Debug, Clone)]
pub struct ProcRouteSource {
    path: PathBuf,
}

impl ProcRouteSource {
    pub fn new() -> Self {
        Self::with_path("/proc/net/route")
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcRouteSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteSource for ProcRouteSource {
    fn snapshot(&self) -> Result<RoutingTable, ProbeError> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| ProbeError::RouteTable(format!("{}: {}", self.path.display(), e)))?;
        let locals = interfaces::enumerate().map_err(|e| ProbeError::RouteTable(e.to_string()))?;

        let entries = parse_proc_route(&text, |name| interfaces::ipv4_of(&locals, name));
        let mut table = RoutingTable::from_entries(entries);
        if table.primary_interface.is_none() {
            table.primary_interface = interfaces::select_primary(&locals);
        }
        debug!(
            routes = table.entries.len(),
            primary = ?table.primary_interface,
            "Routing table snapshot"
        );
        Ok(table)
    }
}

/// Parse `/proc/net/route` text.
///
/// Addresses are printed as native-endian hex, so `00FFFFFF` is
/// `255.255.255.0` on little-endian hosts. Routes not marked up are dropped.
pub fn parse_proc_route<F>(text: &str, address_of: F) -> Vec<RouteEntry>
where
    F: Fn(&str) -> Option<Ipv4Addr>,
{
    let hex_addr = |s: &str| u32::from_str_radix(s, 16).ok().map(|v| Ipv4Addr::from(v.to_ne_bytes()));

    text.lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 8 {
                return None;
            }
            let flags = u32::from_str_radix(cols[3], 16).ok()?;
            if flags & RTF_UP == 0 {
                return None;
            }
            let network = hex_addr(cols[1])?;
            let netmask = u32::from(hex_addr(cols[7])?);
            let interface = cols[0];
            let local = address_of(interface).unwrap_or(Ipv4Addr::UNSPECIFIED);
            Some(RouteEntry::new(network, netmask, interface, local))
        })
        .collect()
}
