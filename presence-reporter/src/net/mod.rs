//! Local network topology and ARP probing

pub mod arp;
pub mod interfaces;
#[cfg(target_os = "linux")]
pub mod raw;
pub mod route;
pub mod subnet;

pub use arp::{ArpReply, ArpScanner, MacAddr, UnsupportedScanner};
pub use route::{ProcRouteSource, RouteEntry, RouteSource, RoutingTable};
pub use subnet::Subnet;

use std::sync::Arc;

/// ARP scanner for the current platform
pub fn platform_scanner() -> Arc<dyn ArpScanner> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(raw::RawArpScanner)
    }
    #[cfg(not(target_os = "linux"))]
    {
        Arc::new(UnsupportedScanner)
    }
}
