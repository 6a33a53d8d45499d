use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary presence state reported for a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorState {
    On,
    #[default]
    Off,
}

impl SensorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorState::On => "ON",
            SensorState::Off => "OFF",
        }
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one `Sensor::check_state` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Probed state equals the stored one
    Unchanged,
    /// State flipped and was published
    Changed(SensorState),
    /// Another check on the same sensor is still running
    Busy,
}

/// Inbound request for a full republish; its payload is never interpreted
#[derive(Debug, Clone, Default)]
pub struct Trigger {
    pub source: String,
}

impl Trigger {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }
}
