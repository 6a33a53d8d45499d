//! Presence probes
//!
//! A sensor owns exactly one [`Probe`]. The network-presence probe infers
//! whether a device is around by ARP-sweeping the subnets reachable from the
//! primary interface and looking for the device's hardware address among the
//! answers.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::ProbeError;
use crate::models::SensorState;
use crate::net::{ArpScanner, RouteSource, RoutingTable, Subnet};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

#[async_trait]
pub trait Probe: Send + Sync {
    /// Current presence of the probed target
    async fn probe(&self) -> Result<SensorState, ProbeError>;
}

/// A subnet worth sweeping and the interface to sweep it from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub subnet: Subnet,
    pub interface: String,
}

/// Pick the subnets of `table` that can be ARP-probed, in table order.
///
/// Loopback and default routes, degenerate or oversized netmasks, and
/// subnets not on the primary interface are skipped.
pub fn select_targets(table: &RoutingTable) -> Vec<ProbeTarget> {
    let mut targets = Vec::new();

    for entry in &table.entries {
        if entry.network.is_unspecified()
            || entry.network.is_loopback()
            || entry.interface == "lo"
            || entry.interface_address == Ipv4Addr::LOCALHOST
            || entry.interface_address.is_unspecified()
        {
            debug!("skipping loopback/default route {} on {}", entry.network, entry.interface);
            continue;
        }

        if entry.netmask == 0 || entry.netmask == u32::MAX {
            continue;
        }

        let Some(subnet) = Subnet::from_route(entry.network, entry.netmask) else {
            continue;
        };

        if table.primary_interface.as_deref() != Some(entry.interface.as_str()) {
            warn!(
                "skipping {} because arping on non-primary interface {} is not supported",
                subnet, entry.interface
            );
            continue;
        }

        targets.push(ProbeTarget {
            subnet,
            interface: entry.interface.clone(),
        });
    }

    targets
}

/// Detects a device by hardware address on the local subnets
pub struct NetworkPresenceProbe {
    target: String,
    routes: Arc<dyn RouteSource>,
    scanner: Arc<dyn ArpScanner>,
    timeout: Duration,
}

impl NetworkPresenceProbe {
    pub fn new(
        target: impl Into<String>,
        routes: Arc<dyn RouteSource>,
        scanner: Arc<dyn ArpScanner>,
    ) -> Self {
        Self {
            target: target.into(),
            routes,
            scanner,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl Probe for NetworkPresenceProbe {
    async fn probe(&self) -> Result<SensorState, ProbeError> {
        let table = self.routes.snapshot()?;

        for candidate in select_targets(&table) {
            let replies = match self
                .scanner
                .scan(&candidate.subnet, &candidate.interface, self.timeout)
                .await
            {
                Ok(replies) => replies,
                Err(e) => {
                    if e.is_permission_denied() {
                        error!("{}. Did you run as root?", e);
                    }
                    return Err(e);
                }
            };

            if let Some(hit) = replies.iter().find(|r| r.sender_mac.matches(&self.target)) {
                info!("Switching to ON -> Found matching MAC: {}", hit.sender_mac);
                return Ok(SensorState::On);
            }
            debug!(
                "{} not among {} answers on {}",
                self.target,
                replies.len(),
                candidate.subnet
            );
        }

        Ok(SensorState::Off)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{ArpReply, MacAddr, RouteEntry};
    use parking_lot::Mutex;
    use std::io;

    struct StaticRoutes(RoutingTable);

    impl RouteSource for StaticRoutes {
        fn snapshot(&self) -> Result<RoutingTable, ProbeError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct FakeScanner {
        answers: Vec<ArpReply>,
        deny: bool,
        scanned: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ArpScanner for FakeScanner {
        async fn scan(
            &self,
            subnet: &Subnet,
            interface: &str,
            _timeout: Duration,
        ) -> Result<Vec<ArpReply>, ProbeError> {
            self.scanned.lock().push(subnet.to_string());
            if self.deny {
                return Err(ProbeError::from_io(interface, io::Error::from(io::ErrorKind::PermissionDenied)));
            }
            Ok(self.answers.clone())
        }
    }

    fn lan_table() -> RoutingTable {
        RoutingTable {
            entries: vec![RouteEntry::new(
                Ipv4Addr::new(192, 168, 1, 0),
                0xFFFFFF00,
                "eth0",
                Ipv4Addr::new(192, 168, 1, 1),
            )],
            primary_interface: Some("eth0".into()),
        }
    }

    fn reply(mac: &str) -> ArpReply {
        ArpReply {
            sender_mac: mac.parse::<MacAddr>().unwrap(),
            sender_ip: Ipv4Addr::new(192, 168, 1, 42),
        }
    }

    #[test]
    fn test_select_targets_filters() {
        let table = RoutingTable {
            entries: vec![
                RouteEntry::new(Ipv4Addr::UNSPECIFIED, 0, "eth0", Ipv4Addr::new(192, 168, 1, 2)),
                RouteEntry::new(Ipv4Addr::new(127, 0, 0, 0), 0xFF000000, "lo", Ipv4Addr::LOCALHOST),
                RouteEntry::new(Ipv4Addr::new(192, 168, 1, 7), 0xFFFFFFFF, "eth0", Ipv4Addr::new(192, 168, 1, 2)),
                RouteEntry::new(Ipv4Addr::new(10, 0, 0, 0), 0xFF000000, "eth0", Ipv4Addr::new(10, 0, 0, 2)),
                RouteEntry::new(Ipv4Addr::new(172, 17, 0, 0), 0xFFFF0000, "docker0", Ipv4Addr::new(172, 17, 0, 1)),
                RouteEntry::new(Ipv4Addr::new(192, 168, 1, 0), 0xFFFFFF00, "eth0", Ipv4Addr::new(192, 168, 1, 2)),
            ],
            primary_interface: Some("eth0".into()),
        };

        let targets = select_targets(&table);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].subnet.to_string(), "192.168.1.0/24");
        assert_eq!(targets[0].interface, "eth0");
    }

    #[tokio::test]
    async fn test_matching_mac_is_on() {
        let scanner = Arc::new(FakeScanner {
            answers: vec![reply("00:11:22:33:44:55"), reply("aa:bb:cc:dd:ee:ff")],
            ..Default::default()
        });
        let probe = NetworkPresenceProbe::new(
            "AA:BB:CC:DD:EE:FF",
            Arc::new(StaticRoutes(lan_table())),
            scanner.clone(),
        );

        assert_eq!(probe.probe().await.unwrap(), SensorState::On);
        assert_eq!(*scanner.scanned.lock(), vec!["192.168.1.0/24".to_string()]);
    }

    #[tokio::test]
    async fn test_absent_mac_is_off() {
        let probe = NetworkPresenceProbe::new(
            "aa:bb:cc:dd:ee:ff",
            Arc::new(StaticRoutes(lan_table())),
            Arc::new(FakeScanner {
                answers: vec![reply("00:11:22:33:44:55")],
                ..Default::default()
            }),
        );
        assert_eq!(probe.probe().await.unwrap(), SensorState::Off);
    }

    #[tokio::test]
    async fn test_no_candidate_subnet_is_off() {
        let scanner = Arc::new(FakeScanner::default());
        let mut table = lan_table();
        table.primary_interface = Some("wlan0".into());
        let probe = NetworkPresenceProbe::new("aa:bb:cc:dd:ee:ff", Arc::new(StaticRoutes(table)), scanner.clone());

        assert_eq!(probe.probe().await.unwrap(), SensorState::Off);
        assert!(scanner.scanned.lock().is_empty());
    }

    #[tokio::test]
    async fn test_permission_error_propagates() {
        let probe = NetworkPresenceProbe::new(
            "aa:bb:cc:dd:ee:ff",
            Arc::new(StaticRoutes(lan_table())),
            Arc::new(FakeScanner {
                deny: true,
                ..Default::default()
            }),
        );
        let err = probe.probe().await.unwrap_err();
        assert!(err.is_permission_denied());
    }
}
