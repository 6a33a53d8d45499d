//! Local interface discovery
//!
//! This module handles:
//! - Network interface enumeration with IPv4 and hardware addresses
//! - Interface classification (Ethernet > WiFi > Other)
//! - Primary interface fallback when the routing table has no default route

use if_addrs::{get_if_addrs, IfAddr};
use std::net::Ipv4Addr;
use tracing::{debug, info, warn};

use super::arp::MacAddr;

/// Local network interface information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    pub name: String,
    pub mac: Option<MacAddr>,
    pub ipv4: Option<Ipv4Addr>,
    pub interface_type: InterfaceType,
}

/// Interface type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceType {
    Ethernet,
    Wireless,
    Loopback,
    Other,
}

impl InterfaceType {
    /// Classify interface type based on name patterns
    pub fn classify(name: &str) -> Self {
        let name_lower = name.to_lowercase();

        if name_lower == "lo" || name_lower.starts_with("lo0") {
            return InterfaceType::Loopback;
        }

        if name_lower.contains("wlan")
            || name_lower.contains("wifi")
            || name_lower.starts_with("wlp")
            || name_lower.starts_with("wlo")
        {
            return InterfaceType::Wireless;
        }

        if name_lower.starts_with("eth") || name_lower.starts_with("en") {
            return InterfaceType::Ethernet;
        }

        InterfaceType::Other
    }
}

/// Enumerate IPv4-capable interfaces with their hardware address
pub fn enumerate() -> std::io::Result<Vec<LocalInterface>> {
    debug!("Enumerating network interfaces...");

    let mut interfaces: Vec<LocalInterface> = Vec::new();
    for if_addr in get_if_addrs()? {
        let IfAddr::V4(v4) = &if_addr.addr else {
            continue;
        };

        if interfaces.iter().any(|i| i.name == if_addr.name) {
            continue;
        }

        let interface = LocalInterface {
            name: if_addr.name.clone(),
            mac: hardware_address(&if_addr.name),
            ipv4: Some(v4.ip),
            interface_type: InterfaceType::classify(&if_addr.name),
        };
        debug!("Found interface: {} ({:?})", interface.name, interface.ipv4);
        interfaces.push(interface);
    }

    Ok(interfaces)
}

/// Look up a single interface by name
pub fn lookup(name: &str) -> std::io::Result<Option<LocalInterface>> {
    Ok(enumerate()?.into_iter().find(|i| i.name == name))
}

/// IPv4 address of the named interface, if it has one
pub fn ipv4_of(interfaces: &[LocalInterface], name: &str) -> Option<Ipv4Addr> {
    interfaces
        .iter()
        .find(|i| i.name == name)
        .and_then(|i| i.ipv4)
}

fn hardware_address(interface_name: &str) -> Option<MacAddr> {
    match mac_address::mac_address_by_name(interface_name) {
        Ok(Some(mac)) => Some(MacAddr(mac.bytes())),
        Ok(None) => {
            debug!("No MAC found for interface: {}", interface_name);
            None
        }
        Err(e) => {
            debug!("Error getting MAC for {}: {}", interface_name, e);
            None
        }
    }
}

/// Select the primary interface by priority when no default route is known
pub fn select_primary(interfaces: &[LocalInterface]) -> Option<String> {
    let candidates: Vec<&LocalInterface> = interfaces
        .iter()
        .filter(|i| i.interface_type != InterfaceType::Loopback)
        .collect();

    for wanted in [InterfaceType::Ethernet, InterfaceType::Wireless] {
        if let Some(interface) = candidates.iter().find(|i| i.interface_type == wanted) {
            info!("Selected {:?} interface as primary: {}", wanted, interface.name);
            return Some(interface.name.clone());
        }
    }

    match candidates.first() {
        Some(interface) => {
            warn!("No Ethernet/WiFi found, using first interface: {}", interface.name);
            Some(interface.name.clone())
        }
        None => None,
    }
}
