//! Dispatch bridge: inbound state requests → immediate check + publish
//!
//! The content of a trigger does not matter, its arrival means "someone wants
//! the current values now". Every pollable sensor is checked and then
//! published unconditionally. Scheduled due times are left alone.

use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::models::Trigger;
use crate::sensor::{Sensor, SensorSet};

#[derive(Debug, Clone)]
pub struct DispatchBridge {
    sensors: SensorSet,
}

impl DispatchBridge {
    pub fn new(sensors: SensorSet) -> Self {
        Self { sensors }
    }

    /// Check and republish every pollable sensor; returns how many were refreshed
    pub async fn refresh_all(&self) -> usize {
        let pollable: Vec<&Arc<Sensor>> = self.sensors.iter().filter(|s| s.is_pollable()).collect();
        join_all(pollable.iter().map(|sensor| Self::refresh(sensor))).await;
        pollable.len()
    }

    async fn refresh(sensor: &Sensor) {
        let checked = AssertUnwindSafe(async {
            match sensor.check_state().await {
                Ok(outcome) => debug!(sensor = sensor.identifier(), ?outcome, "On-demand check done"),
                Err(e) => error!(sensor = sensor.identifier(), "On-demand check failed: {}", e),
            }
            if let Err(e) = sensor.publish_state().await {
                error!(sensor = sensor.identifier(), "On-demand publish failed: {}", e);
            }
        })
        .catch_unwind()
        .await;

        if checked.is_err() {
            error!(sensor = sensor.identifier(), "On-demand refresh panicked");
        }
    }

    /// Serve triggers until the channel closes or `shutdown` fires.
    ///
    /// A refresh still running when `shutdown` fires is dropped.
    pub async fn run(self, mut triggers: mpsc::Receiver<Trigger>, shutdown: CancellationToken) {
        info!("Dispatch bridge listening for state requests");
        loop {
            let trigger = tokio::select! {
                _ = shutdown.cancelled() => break,
                trigger = triggers.recv() => trigger,
            };
            let Some(trigger) = trigger else {
                debug!("Trigger channel closed");
                break;
            };

            info!("Received a request for current state from {}, publishing", trigger.source);
            tokio::select! {
                _ = shutdown.cancelled() => {
                    warn!("Abandoning state request refresh on shutdown");
                    break;
                }
                refreshed = self.refresh_all() => debug!(refreshed, "State request served"),
            }
        }
        info!("Dispatch bridge stopped");
    }
}
