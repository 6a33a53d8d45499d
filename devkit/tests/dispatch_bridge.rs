//! On-demand refresh through the dispatch bridge

use presence_devkit::{ScriptedProbe, TestHarness};
use presence_reporter::{CheckOutcome, DispatchBridge, SensorState, Trigger};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn test_refresh_republishes_unchanged_state() {
    let mut harness = TestHarness::new();
    let (sensor, probe) = harness
        .add_scripted("aa:bb:cc:dd:ee:ff", "presence/phone", 10.0, ScriptedProbe::always(SensorState::On))
        .await;

    assert_eq!(sensor.check_state().await.unwrap(), CheckOutcome::Changed(SensorState::On));
    let polled_at = sensor.last_polled_at();

    tokio::time::advance(Duration::from_secs(3)).await;
    let bridge = DispatchBridge::new(harness.sensor_set());
    assert_eq!(bridge.refresh_all().await, 1);

    assert_eq!(probe.calls(), 2);
    assert_eq!(harness.published("presence/phone"), vec!["OFF", "ON", "ON"]);
    assert_eq!(sensor.last_polled_at(), polled_at);
}

#[tokio::test]
async fn test_refresh_skips_on_demand_sensors() {
    let mut harness = TestHarness::new();
    let (_, manual) = harness
        .add_scripted("aa:bb:cc:dd:ee:01", "presence/manual", 0.0, ScriptedProbe::always(SensorState::On))
        .await;
    let (_, polled) = harness
        .add_scripted("aa:bb:cc:dd:ee:02", "presence/polled", 5.0, ScriptedProbe::always(SensorState::Off))
        .await;

    let bridge = DispatchBridge::new(harness.sensor_set());
    assert_eq!(bridge.refresh_all().await, 1);

    assert_eq!(manual.calls(), 0);
    assert_eq!(polled.calls(), 1);
    assert_eq!(harness.published("presence/polled"), vec!["OFF", "OFF"]);
}

#[tokio::test]
async fn test_probe_failure_still_publishes_last_state() {
    let mut harness = TestHarness::new();
    let probe = ScriptedProbe::always(SensorState::On);
    probe.push_error(presence_devkit::fixtures::permission_denied("eth0"));
    let (sensor, _) = harness
        .add_scripted("aa:bb:cc:dd:ee:ff", "presence/phone", 1.0, probe)
        .await;

    let bridge = DispatchBridge::new(harness.sensor_set());
    bridge.refresh_all().await;

    assert_eq!(sensor.state(), SensorState::Off);
    assert_eq!(harness.published("presence/phone"), vec!["OFF", "OFF"]);
}

#[tokio::test]
async fn test_trigger_channel_drives_refresh() {
    let mut harness = TestHarness::new();
    harness
        .add_scripted("aa:bb:cc:dd:ee:ff", "presence/phone", 1.0, ScriptedProbe::always(SensorState::On))
        .await;

    let (tx, rx) = mpsc::channel(4);
    let shutdown = CancellationToken::new();
    let bridge = tokio::spawn(DispatchBridge::new(harness.sensor_set()).run(rx, shutdown.clone()));

    tx.send(Trigger::new("presence/request")).await.unwrap();
    // change published by the check, then the unconditional republish
    harness.wait_for_publish("presence/phone", 3, 2000).await.unwrap();
    assert_eq!(harness.published("presence/phone"), vec!["OFF", "ON", "ON"]);

    shutdown.cancel();
    bridge.await.unwrap();
}
