/*!
Test Harness pour le presence-reporter

Facilite l'écriture de tests de bout en bout avec:
- Publisher enregistreur partagé par tous les capteurs
- Construction de capteurs à partir de probes scriptées
- Attente des publications avec timeout
*/

use crate::fixtures::ScriptedProbe;
use crate::mock_publisher::MockPublisher;
use anyhow::Result;
use presence_reporter::config::SchedulerConfig;
use presence_reporter::{Probe, Publisher, Scheduler, Sensor, SensorSet, SensorSpec};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Harness de test: un publisher mock et les capteurs construits dessus
pub struct TestHarness {
    pub publisher: MockPublisher,
    sensors: Vec<Arc<Sensor>>,
}

impl TestHarness {
    /// Crée un nouveau harness de test
    pub fn new() -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        Self {
            publisher: MockPublisher::new(),
            sensors: Vec::new(),
        }
    }

    /// Ajoute un capteur; son état initial OFF est publié immédiatement
    pub async fn add_sensor(
        &mut self,
        identifier: &str,
        destination: &str,
        poll_secs: f64,
        probe: Arc<dyn Probe>,
    ) -> Arc<Sensor> {
        let publisher: Arc<dyn Publisher> = Arc::new(self.publisher.clone());
        let sensor = Sensor::new(SensorSpec::new(identifier, destination, poll_secs), probe, publisher).await;
        self.sensors.push(sensor.clone());
        sensor
    }

    /// Raccourci: capteur piloté par une `ScriptedProbe` partagée
    pub async fn add_scripted(
        &mut self,
        identifier: &str,
        destination: &str,
        poll_secs: f64,
        probe: ScriptedProbe,
    ) -> (Arc<Sensor>, Arc<ScriptedProbe>) {
        let probe = Arc::new(probe);
        let sensor = self
            .add_sensor(identifier, destination, poll_secs, probe.clone())
            .await;
        (sensor, probe)
    }

    pub fn sensor_set(&self) -> SensorSet {
        SensorSet::new(self.sensors.clone())
    }

    /// Scheduler sur les capteurs du harness, tick de 50 ms
    pub fn scheduler(&self) -> Scheduler {
        let config = SchedulerConfig {
            tick_millis: 50,
            ..SchedulerConfig::default()
        };
        Scheduler::new(self.sensor_set(), &config)
    }

    /// Attend qu'une destination ait reçu au moins `count` messages
    pub async fn wait_for_publish(&self, destination: &str, count: usize, timeout_ms: u64) -> Result<()> {
        let publisher = self.publisher.clone();
        let destination = destination.to_string();

        timeout(Duration::from_millis(timeout_ms), async move {
            while publisher.count_for(&destination) < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .map_err(|_| anyhow::anyhow!("Timed out waiting for {} publications", count))?;

        log::info!("✅ Got {} publications", count);
        Ok(())
    }

    /// Valeurs publiées vers une destination, publication initiale comprise
    pub fn published(&self, destination: &str) -> Vec<String> {
        self.publisher.values_for(destination)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
