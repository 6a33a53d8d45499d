//! Polling scheduler
//!
//! One loop scans every sensor, marks the due ones and hands each to its own
//! task, then sleeps for a fixed tick. The loop never waits for a check.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::models::CheckOutcome;
use crate::sensor::{Sensor, SensorSet};

pub struct Scheduler {
    sensors: SensorSet,
    tick: Duration,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    dispatched: Arc<AtomicU64>,
}

impl Scheduler {
    pub fn new(sensors: SensorSet, config: &SchedulerConfig) -> Self {
        Self {
            sensors,
            tick: config.tick(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_checks.max(1))),
            tracker: TaskTracker::new(),
            dispatched: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Read access to the sensors, for the dispatch bridge
    pub fn sensors(&self) -> SensorSet {
        self.sensors.clone()
    }

    /// Checks dispatched since start
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Number of dispatched checks not finished yet
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Pick the sensors due at `now`, stamping their last poll time.
    ///
    /// A picked sensor is skipped by later scans until its dispatched task
    /// ends, so a check waiting for a permit is never queued twice.
    pub fn scan(&self, now: Instant) -> Vec<Arc<Sensor>> {
        self.sensors
            .iter()
            .filter(|sensor| sensor.is_due(now))
            .map(|sensor| {
                sensor.mark_polled(now);
                Arc::clone(sensor)
            })
            .collect()
    }

    /// Run one sensor check on its own task; errors and panics stop here
    pub fn dispatch(&self, sensor: Arc<Sensor>) {
        let permits = Arc::clone(&self.permits);
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        self.tracker.spawn(async move {
            let _slot = sensor.scheduled_slot();
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };

            match AssertUnwindSafe(sensor.check_state()).catch_unwind().await {
                Ok(Ok(CheckOutcome::Busy)) => {
                    debug!(sensor = sensor.identifier(), "Previous check still running")
                }
                Ok(Ok(outcome)) => debug!(sensor = sensor.identifier(), ?outcome, "Check done"),
                Ok(Err(e)) => error!(sensor = sensor.identifier(), "Check failed: {}", e),
                Err(_) => error!(sensor = sensor.identifier(), "Check panicked"),
            }
        });
    }

    /// Scan / dispatch / sleep until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) {
        let pollable = self.sensors.iter().filter(|s| s.is_pollable()).count();
        info!(
            sensors = self.sensors.len(),
            pollable,
            tick_ms = self.tick.as_millis() as u64,
            "Kicking off polling tasks..."
        );

        while !shutdown.is_cancelled() {
            for sensor in self.scan(Instant::now()) {
                self.dispatch(sensor);
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.tick) => {}
            }
        }
        info!("Polling loop stopped");
    }

    /// Stop accepting checks and wait up to `grace` for running ones.
    ///
    /// Returns `false` when some checks were abandoned.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tracker.close();
        if self.tracker.is_empty() {
            return true;
        }
        info!("Waiting for {} in-flight checks", self.tracker.len());
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!("Abandoning {} in-flight checks", self.tracker.len());
                false
            }
        }
    }
}
