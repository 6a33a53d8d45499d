//! Presence Reporter - polls network-presence sensors and reports state changes
//!
//! Components, leaves first:
//! - [`probe`]: ARP-based presence detection over the primary interface's subnets
//! - [`sensor`]: identity + state + probe, publishes on change
//! - [`scheduler`]: per-sensor poll intervals, concurrent non-blocking checks
//! - [`bridge`]: inbound state requests force a check + publish of every sensor
//! - [`publisher`]: MQTT and REST transports

pub mod app;
pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod net;
pub mod probe;
pub mod publisher;
pub mod scheduler;
pub mod sensor;
pub mod shutdown;

pub use app::{Reporter, Transports};
pub use bridge::DispatchBridge;
pub use config::ReporterConfig;
pub use error::{ConfigError, ProbeError, PublishError, SensorError};
pub use models::{CheckOutcome, SensorState, Trigger};
pub use probe::{NetworkPresenceProbe, Probe};
pub use publisher::Publisher;
pub use scheduler::Scheduler;
pub use sensor::{Sensor, SensorSet, SensorSpec};
pub use shutdown::Shutdown;
