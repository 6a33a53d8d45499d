//! Error types for the presence reporter
//!
//! Probe, publish and configuration failures are kept apart so the
//! scheduler and bridge can decide what to log and what to propagate.

use std::io;
use thiserror::Error;

/// Failure while determining a sensor's presence
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Raw socket access denied (process not running as root / without CAP_NET_RAW)
    #[error("permission denied opening raw socket on {interface}: {source}")]
    PermissionDenied {
        interface: String,
        #[source]
        source: io::Error,
    },

    /// Any other socket failure, passed through untouched
    #[error("socket error on {interface}: {source}")]
    Socket {
        interface: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read routing table: {0}")]
    RouteTable(String),

    #[error("interface {0} has no usable IPv4 or hardware address")]
    InterfaceUnavailable(String),

    #[error("active probing is not supported on this platform")]
    Unsupported,
}

impl ProbeError {
    /// Classify an I/O error raised while talking to `interface`
    pub fn from_io(interface: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::PermissionDenied => ProbeError::PermissionDenied {
                interface: interface.to_string(),
                source,
            },
            _ => ProbeError::Socket {
                interface: interface.to_string(),
                source,
            },
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ProbeError::PermissionDenied { .. })
    }
}

/// Failure while handing a state to a transport
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint {url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("publisher already disconnected")]
    Disconnected,
}

/// Failure of a single sensor check, as seen at the dispatch boundary
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("probe for {identifier} failed: {source}")]
    Probe {
        identifier: String,
        #[source]
        source: ProbeError,
    },

    #[error("publish to {destination} failed: {source}")]
    Publish {
        destination: String,
        #[source]
        source: PublishError,
    },
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("sensor #{index}: {reason}")]
    InvalidSensor { index: usize, reason: String },

    #[error("could not find config directory")]
    NoConfigDir,
}
