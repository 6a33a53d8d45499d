//! End-to-end presence detection: routes → ARP sweep → sensor → publisher

use presence_devkit::fixtures::{reply, route};
use presence_devkit::{FakeArpScanner, MockPublisher, StaticRoutes, TestHarness};
use presence_reporter::net::RoutingTable;
use presence_reporter::{CheckOutcome, NetworkPresenceProbe, SensorState};
use std::sync::Arc;

const PHONE: &str = "AA:BB:CC:DD:EE:FF";

#[tokio::test]
async fn test_device_appears_on_lan() {
    let mut harness = TestHarness::new();
    let scanner = Arc::new(FakeArpScanner::new());
    let probe = NetworkPresenceProbe::new(PHONE, Arc::new(StaticRoutes::single_lan()), scanner.clone());
    let sensor = harness
        .add_sensor(PHONE, "presence/phone", 5.0, Arc::new(probe))
        .await;

    assert_eq!(sensor.check_state().await.unwrap(), CheckOutcome::Unchanged);

    scanner.answer("192.168.1.0/24", vec![reply("11:22:33:44:55:66"), reply("aa:bb:cc:dd:ee:ff")]);
    assert_eq!(sensor.check_state().await.unwrap(), CheckOutcome::Changed(SensorState::On));
    assert_eq!(sensor.check_state().await.unwrap(), CheckOutcome::Unchanged);

    let on: Vec<_> = harness
        .publisher
        .find_messages_by_destination("presence/phone")
        .into_iter()
        .filter(|m| m.value == "ON")
        .collect();
    assert_eq!(on.len(), 1);
    assert_eq!(harness.published("presence/phone"), vec!["OFF", "ON"]);
    assert!(scanner.scans().iter().all(|(subnet, iface)| subnet == "192.168.1.0/24" && iface == "eth0"));
}

#[tokio::test]
async fn test_device_leaves_lan() {
    let mut harness = TestHarness::new();
    let scanner = Arc::new(FakeArpScanner::new());
    scanner.answer("192.168.1.0/24", vec![reply(PHONE)]);
    let probe = NetworkPresenceProbe::new(PHONE, Arc::new(StaticRoutes::single_lan()), scanner.clone());
    let sensor = harness.add_sensor(PHONE, "presence/phone", 5.0, Arc::new(probe)).await;

    sensor.check_state().await.unwrap();
    scanner.answer("192.168.1.0/24", vec![]);
    assert_eq!(sensor.check_state().await.unwrap(), CheckOutcome::Changed(SensorState::Off));
    assert_eq!(harness.published("presence/phone"), vec!["OFF", "ON", "OFF"]);
}

#[tokio::test]
async fn test_permission_denied_keeps_state() {
    let mut harness = TestHarness::new();
    let scanner = Arc::new(FakeArpScanner::new());
    scanner.answer("192.168.1.0/24", vec![reply(PHONE)]);
    let probe = NetworkPresenceProbe::new(PHONE, Arc::new(StaticRoutes::single_lan()), scanner.clone());
    let sensor = harness.add_sensor(PHONE, "presence/phone", 5.0, Arc::new(probe)).await;
    sensor.check_state().await.unwrap();

    scanner.deny_permission(true);
    let err = sensor.check_state().await.unwrap_err();
    assert!(err.to_string().contains(PHONE));
    assert_eq!(sensor.state(), SensorState::On);
    assert!(!sensor.is_in_flight());
}

#[tokio::test]
async fn test_secondary_interfaces_not_swept() {
    let mut harness = TestHarness::new();
    let scanner = Arc::new(FakeArpScanner::new());
    scanner.answer("10.0.0.0/24", vec![reply(PHONE)]);
    let routes = StaticRoutes(RoutingTable {
        entries: vec![
            route("0.0.0.0", 0, "eth0", "192.168.1.1"),
            route("192.168.1.0", 0xFFFFFF00, "eth0", "192.168.1.1"),
            route("10.0.0.0", 0xFFFFFF00, "wlan0", "10.0.0.2"),
            route("127.0.0.0", 0xFF000000, "lo", "127.0.0.1"),
        ],
        primary_interface: Some("eth0".into()),
    });
    let probe = NetworkPresenceProbe::new(PHONE, Arc::new(routes), scanner.clone());
    let sensor = harness.add_sensor(PHONE, "presence/phone", 5.0, Arc::new(probe)).await;

    assert_eq!(sensor.check_state().await.unwrap(), CheckOutcome::Unchanged);
    assert_eq!(scanner.scans(), vec![("192.168.1.0/24".to_string(), "eth0".to_string())]);
}

#[tokio::test]
async fn test_publishes_only_when_state_differs() {
    let publisher = MockPublisher::new();
    let scanner = Arc::new(FakeArpScanner::new());
    let probe = NetworkPresenceProbe::new(PHONE, Arc::new(StaticRoutes::single_lan()), scanner.clone());
    let sensor = presence_reporter::Sensor::new(
        presence_reporter::SensorSpec::new(PHONE, "presence/phone", 5.0),
        Arc::new(probe),
        Arc::new(publisher.clone()),
    )
    .await;

    // a failed report is not replayed by later checks of the same state
    publisher.set_failing(true);
    scanner.answer("192.168.1.0/24", vec![reply(PHONE)]);
    assert!(sensor.check_state().await.is_err());
    assert_eq!(sensor.state(), SensorState::On);

    publisher.set_failing(false);
    let mut published = publisher.get_published_messages().len();
    for present in [true, true, false, false, true] {
        let answers = if present { vec![reply(PHONE)] } else { vec![] };
        scanner.answer("192.168.1.0/24", answers);
        let before = sensor.state();

        let outcome = sensor.check_state().await.unwrap();
        let after = sensor.state();
        let now = publisher.get_published_messages().len();

        assert_eq!(now - published, usize::from(before != after), "{:?}", outcome);
        published = now;
    }
    assert_eq!(publisher.values_for("presence/phone"), vec!["OFF", "OFF", "ON"]);
}
