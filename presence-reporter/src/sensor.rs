//! Sensors: identity + current state + the probe that refreshes it

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::SensorError;
use crate::models::{CheckOutcome, SensorState};
use crate::probe::Probe;
use crate::publisher::Publisher;

/// Static description of a sensor, as read from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSpec {
    pub identifier: String,
    pub destination: String,
    /// `None` for on-demand sensors
    pub poll_interval: Option<Duration>,
}

impl SensorSpec {
    pub fn new(identifier: impl Into<String>, destination: impl Into<String>, poll_secs: f64) -> Self {
        Self {
            identifier: identifier.into(),
            destination: destination.into(),
            poll_interval: poll_interval(poll_secs),
        }
    }
}

/// `None` for `<= 0` (and NaN); values past `Duration::MAX` saturate
pub(crate) fn poll_interval(poll_secs: f64) -> Option<Duration> {
    (poll_secs > 0.0).then(|| Duration::try_from_secs_f64(poll_secs).unwrap_or(Duration::MAX))
}

pub struct Sensor {
    identifier: String,
    destination: String,
    poll_interval: Option<Duration>,
    state: Mutex<SensorState>,
    last_polled_at: Mutex<Instant>,
    /// Set from the scheduler's scan until its dispatched task ends
    scheduled: AtomicBool,
    in_flight: AtomicBool,
    probe: Arc<dyn Probe>,
    publisher: Arc<dyn Publisher>,
}

/// Clears a flag when dropped, including during a panic
pub(crate) struct ClearOnDrop<'a>(&'a AtomicBool);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Sensor {
    /// Build a sensor and publish its initial `OFF` state.
    ///
    /// A failed initial publish is only logged.
    pub async fn new(
        spec: SensorSpec,
        probe: Arc<dyn Probe>,
        publisher: Arc<dyn Publisher>,
    ) -> Arc<Self> {
        info!(
            "----------Configuring sensor: Address = {} Destination = {} Poll = {:?}",
            spec.identifier, spec.destination, spec.poll_interval
        );

        let sensor = Arc::new(Self {
            identifier: spec.identifier,
            destination: spec.destination,
            poll_interval: spec.poll_interval,
            state: Mutex::new(SensorState::Off),
            last_polled_at: Mutex::new(Instant::now()),
            scheduled: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            probe,
            publisher,
        });

        if let Err(e) = sensor.publish_state().await {
            warn!("Initial publish failed: {}", e);
        }
        sensor
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    /// Whether the periodic scan may pick this sensor at all
    pub fn is_pollable(&self) -> bool {
        self.poll_interval.is_some()
    }

    pub fn state(&self) -> SensorState {
        *self.state.lock()
    }

    pub fn last_polled_at(&self) -> Instant {
        *self.last_polled_at.lock()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Whether a scheduled check is queued or running
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Due when pollable, idle and at least one interval since the last dispatch
    pub fn is_due(&self, now: Instant) -> bool {
        match self.poll_interval {
            Some(interval) => {
                !self.is_scheduled()
                    && !self.is_in_flight()
                    && now.saturating_duration_since(self.last_polled_at()) >= interval
            }
            None => false,
        }
    }

    /// Record a scheduled dispatch; called before the check starts.
    ///
    /// The sensor stays out of the scan until [`Sensor::scheduled_slot`]'s
    /// guard is dropped by the dispatched task.
    pub(crate) fn mark_polled(&self, now: Instant) {
        *self.last_polled_at.lock() = now;
        self.scheduled.store(true, Ordering::Release);
    }

    pub(crate) fn scheduled_slot(&self) -> ClearOnDrop<'_> {
        ClearOnDrop(&self.scheduled)
    }

    /// Probe and publish if the state changed.
    ///
    /// Returns [`CheckOutcome::Busy`] without probing when another check on
    /// this sensor is still running. On a probe error the stored state is
    /// left untouched.
    pub async fn check_state(&self) -> Result<CheckOutcome, SensorError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Check for {} already running", self.identifier);
            return Ok(CheckOutcome::Busy);
        }
        let _in_flight = ClearOnDrop(&self.in_flight);

        debug!("Checking state for {}", self.identifier);
        let probed = self.probe.probe().await.map_err(|source| SensorError::Probe {
            identifier: self.identifier.clone(),
            source,
        })?;

        let previous = std::mem::replace(&mut *self.state.lock(), probed);
        if probed != previous {
            info!("{} changed {} -> {}", self.identifier, previous, probed);
            self.publish_state().await?;
            return Ok(CheckOutcome::Changed(probed));
        }

        Ok(CheckOutcome::Unchanged)
    }

    /// Send the current state to the publisher, whatever it is.
    ///
    /// A failure is returned as is; the state stays committed and nothing
    /// is queued for a later attempt.
    pub async fn publish_state(&self) -> Result<(), SensorError> {
        let state = self.state();
        self.publisher
            .publish(state.as_str(), &self.destination)
            .await
            .map_err(|source| SensorError::Publish {
                destination: self.destination.clone(),
                source,
            })
    }
}

impl std::fmt::Debug for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sensor")
            .field("identifier", &self.identifier)
            .field("destination", &self.destination)
            .field("poll_interval", &self.poll_interval)
            .field("state", &self.state())
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

/// Shared, read-only view over the configured sensors
#[derive(Debug, Clone)]
pub struct SensorSet {
    sensors: Arc<[Arc<Sensor>]>,
}

impl SensorSet {
    pub fn new(sensors: Vec<Arc<Sensor>>) -> Self {
        Self {
            sensors: sensors.into(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Sensor>> {
        self.sensors.iter()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}
