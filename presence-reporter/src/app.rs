//! Wiring: configuration → publishers, probes, sensors, scheduler and bridge

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::bridge::DispatchBridge;
use crate::config::{ReportType, ReporterConfig, SensorKind};
use crate::models::Trigger;
use crate::net::{self, ArpScanner, ProcRouteSource, RouteSource};
use crate::probe::NetworkPresenceProbe;
use crate::publisher::{MqttPublisher, Publisher, RestPublisher};
use crate::scheduler::Scheduler;
use crate::sensor::{Sensor, SensorSet, SensorSpec};
use crate::shutdown::Shutdown;

const TRIGGER_QUEUE: usize = 16;

/// Transports available to sensors, selected per sensor by `report`
#[derive(Clone, Default)]
pub struct Transports {
    pub mqtt: Option<Arc<dyn Publisher>>,
    pub rest: Option<Arc<dyn Publisher>>,
}

impl Transports {
    fn select(&self, report: ReportType) -> Option<Arc<dyn Publisher>> {
        match report {
            ReportType::Mqtt => self.mqtt.clone(),
            ReportType::Rest => self.rest.clone(),
        }
    }

    fn all(&self) -> Vec<Arc<dyn Publisher>> {
        self.mqtt.iter().chain(self.rest.iter()).cloned().collect()
    }
}

/// A fully wired reporter, ready to run
pub struct Reporter {
    scheduler: Arc<Scheduler>,
    bridge: DispatchBridge,
    triggers: mpsc::Receiver<Trigger>,
    transports: Transports,
    grace: Duration,
}

impl Reporter {
    /// Connect the configured transports and build every sensor.
    ///
    /// Each sensor publishes its initial state while being built.
    pub async fn build(config: &ReporterConfig) -> Result<Self> {
        let (tx, rx) = mpsc::channel(TRIGGER_QUEUE);

        let mqtt = config
            .mqtt
            .as_ref()
            .map(|c| Arc::new(MqttPublisher::connect(c, Some(tx.clone()))) as Arc<dyn Publisher>);
        let rest = match &config.rest {
            Some(c) => {
                info!("REST URL set to: {}", c.url);
                Some(Arc::new(RestPublisher::new(c).context("Failed to build REST client")?) as Arc<dyn Publisher>)
            }
            None => None,
        };

        Ok(Self::assemble(
            config,
            Transports { mqtt, rest },
            Arc::new(ProcRouteSource::new()),
            net::platform_scanner(),
            rx,
        )
        .await)
    }

    /// Build sensors against explicit collaborators
    pub async fn assemble(
        config: &ReporterConfig,
        transports: Transports,
        routes: Arc<dyn RouteSource>,
        scanner: Arc<dyn ArpScanner>,
        triggers: mpsc::Receiver<Trigger>,
    ) -> Self {
        info!("Populating the sensor's list...");
        let mut sensors = Vec::new();

        for (index, sensor) in config.sensors.iter().enumerate() {
            if sensor.kind != SensorKind::Wifi {
                error!(
                    "Sensor #{} ({}): '{:?}' sensors are not supported, skipping",
                    index, sensor.destination, sensor.kind
                );
                continue;
            }
            let Some(publisher) = transports.select(sensor.report) else {
                error!(
                    "Sensor #{} ({}): no [{:?}] section configured for its report type, skipping",
                    index, sensor.destination, sensor.report
                );
                continue;
            };

            let probe = NetworkPresenceProbe::new(sensor.address.clone(), routes.clone(), scanner.clone())
                .with_timeout(config.scheduler.probe_timeout());
            let spec = SensorSpec {
                identifier: sensor.address.clone(),
                destination: sensor.destination.clone(),
                poll_interval: sensor.poll_interval(),
            };
            sensors.push(Sensor::new(spec, Arc::new(probe), publisher).await);
        }

        if sensors.is_empty() {
            warn!("No usable sensor configured");
        }

        let set = SensorSet::new(sensors);
        Self {
            scheduler: Arc::new(Scheduler::new(set.clone(), &config.scheduler)),
            bridge: DispatchBridge::new(set),
            triggers,
            transports,
            grace: config.scheduler.shutdown_grace(),
        }
    }

    pub fn sensors(&self) -> SensorSet {
        self.scheduler.sensors()
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler.clone()
    }

    /// Poll until `shutdown` fires, then drain checks and disconnect transports
    pub async fn run(self, shutdown: Shutdown) {
        let token = shutdown.token();
        let bridge = tokio::spawn(self.bridge.run(self.triggers, token.clone()));

        self.scheduler.run(token).await;

        if let Err(e) = bridge.await {
            error!("Dispatch bridge task failed: {}", e);
        }
        self.scheduler.drain(self.grace).await;

        for transport in self.transports.all() {
            match transport.disconnect().await {
                Ok(()) => info!("Disconnected {} transport", transport.name()),
                Err(e) => warn!("Failed to disconnect {} transport: {}", transport.name(), e),
            }
        }
    }
}
