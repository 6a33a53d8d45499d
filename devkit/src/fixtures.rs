/*!
Doubles de test pour la détection de présence

- `ScriptedProbe` : rejoue une séquence d'états, avec délai optionnel
- `StaticRoutes` : table de routage figée
- `FakeArpScanner` : réponses ARP simulées par sous-réseau
*/

use async_trait::async_trait;
use presence_reporter::net::{ArpReply, ArpScanner, MacAddr, RouteEntry, RouteSource, RoutingTable, Subnet};
use presence_reporter::{Probe, ProbeError, SensorState};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Probe qui rejoue des résultats programmés puis renvoie un état par défaut
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Result<SensorState, ProbeError>>>,
    fallback: SensorState,
    delay: Option<Duration>,
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedProbe {
    pub fn always(state: SensorState) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: state,
            delay: None,
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    pub fn sequence(states: Vec<SensorState>) -> Self {
        let fallback = states.last().copied().unwrap_or_default();
        let probe = Self::always(fallback);
        probe.script.lock().unwrap().extend(states.into_iter().map(Ok));
        probe
    }

    /// Chaque appel dure `delay` (temps tokio, compatible avec `start_paused`)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_error(&self, error: ProbeError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn push_state(&self, state: SensorState) {
        self.script.lock().unwrap().push_back(Ok(state));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Plus grand nombre d'appels simultanés observé
    pub fn max_concurrent(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self) -> Result<SensorState, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or(Ok(self.fallback))
    }
}

/// Erreur de permission telle que produite par un socket brut refusé
pub fn permission_denied(interface: &str) -> ProbeError {
    ProbeError::from_io(interface, io::Error::from(io::ErrorKind::PermissionDenied))
}

/// Table de routage figée
#[derive(Debug, Clone)]
pub struct StaticRoutes(pub RoutingTable);

impl StaticRoutes {
    /// Un seul LAN /24 sur `eth0`, interface primaire
    pub fn single_lan() -> Self {
        Self(RoutingTable {
            entries: vec![route("192.168.1.0", 0xFFFFFF00, "eth0", "192.168.1.1")],
            primary_interface: Some("eth0".into()),
        })
    }
}

impl RouteSource for StaticRoutes {
    fn snapshot(&self) -> Result<RoutingTable, ProbeError> {
        Ok(self.0.clone())
    }
}

pub fn route(network: &str, netmask: u32, interface: &str, address: &str) -> RouteEntry {
    RouteEntry::new(
        network.parse().expect("network address"),
        netmask,
        interface,
        address.parse().expect("interface address"),
    )
}

pub fn reply(mac: &str) -> ArpReply {
    ArpReply {
        sender_mac: mac.parse::<MacAddr>().expect("mac address"),
        sender_ip: Ipv4Addr::new(192, 168, 1, 100),
    }
}

/// Scanner ARP simulé : réponses configurées par sous-réseau ("192.168.1.0/24")
#[derive(Default)]
pub struct FakeArpScanner {
    answers: Mutex<HashMap<String, Vec<ArpReply>>>,
    deny: Mutex<bool>,
    scans: Mutex<Vec<(String, String)>>,
}

impl FakeArpScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self, subnet: &str, replies: Vec<ArpReply>) {
        self.answers.lock().unwrap().insert(subnet.to_string(), replies);
    }

    pub fn deny_permission(&self, deny: bool) {
        *self.deny.lock().unwrap() = deny;
    }

    /// (sous-réseau, interface) de chaque balayage effectué
    pub fn scans(&self) -> Vec<(String, String)> {
        self.scans.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArpScanner for FakeArpScanner {
    async fn scan(
        &self,
        subnet: &Subnet,
        interface: &str,
        _timeout: Duration,
    ) -> Result<Vec<ArpReply>, ProbeError> {
        self.scans
            .lock()
            .unwrap()
            .push((subnet.to_string(), interface.to_string()));
        if *self.deny.lock().unwrap() {
            return Err(permission_denied(interface));
        }
        Ok(self
            .answers
            .lock()
            .unwrap()
            .get(&subnet.to_string())
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_probe_sequence() {
        let probe = ScriptedProbe::sequence(vec![SensorState::On, SensorState::Off]);
        probe.push_error(permission_denied("eth0"));

        assert_eq!(probe.probe().await.unwrap(), SensorState::On);
        assert_eq!(probe.probe().await.unwrap(), SensorState::Off);
        assert!(probe.probe().await.unwrap_err().is_permission_denied());
        assert_eq!(probe.probe().await.unwrap(), SensorState::Off);
        assert_eq!(probe.calls(), 4);
    }

    #[tokio::test]
    async fn test_fake_scanner_answers_per_subnet() {
        let scanner = FakeArpScanner::new();
        scanner.answer("192.168.1.0/24", vec![reply("aa:bb:cc:dd:ee:ff")]);
        let subnet = Subnet { network: Ipv4Addr::new(192, 168, 1, 0), prefix: 24 };

        let replies = scanner.scan(&subnet, "eth0", Duration::from_secs(1)).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(scanner.scans(), vec![("192.168.1.0/24".to_string(), "eth0".to_string())]);
    }
}
