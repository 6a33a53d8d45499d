//! Configuration management
//!
//! Handles:
//! - MQTT broker and REST endpoint settings
//! - Scheduler timing knobs
//! - Logging level
//! - The list of sensors to poll

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::net::MacAddr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
    pub mqtt: Option<MqttConfig>,
    pub rest: Option<RestConfig>,
    #[serde(rename = "sensor")]
    pub sensors: Vec<SensorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_millis: u64,
    pub max_concurrent_checks: usize,
    pub shutdown_grace_secs: u64,
    pub probe_timeout_millis: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: Option<String>,
    pub user: Option<String>,
    #[serde(skip_serializing)] // Never write passwords back
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub lwt_topic: Option<String>,
    pub lwt_message: String,
    /// Topic whose messages request an immediate republish of every sensor
    pub request_topic: Option<String>,
    pub tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    pub url: String,
    #[serde(default = "default_rest_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(rename = "type")]
    pub kind: SensorKind,
    pub address: String,
    pub destination: String,
    #[serde(default)]
    pub report: ReportType,
    /// Seconds between scheduled checks; `<= 0` means on-demand only
    #[serde(default)]
    pub poll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    #[serde(alias = "network", alias = "network_presence")]
    Wifi,
    Bluetooth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    #[default]
    Mqtt,
    Rest,
}

fn default_rest_timeout() -> u64 {
    10
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_millis: 500,
            max_concurrent_checks: 16,
            shutdown_grace_secs: 5,
            probe_timeout_millis: 1000,
        }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_millis)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: None,
            user: None,
            password: None,
            keep_alive_secs: 60,
            lwt_topic: None,
            lwt_message: "OFFLINE".to_string(),
            request_topic: None,
            tls: false,
        }
    }
}

impl MqttConfig {
    /// Configured client id, or one derived from the hostname
    pub fn effective_client_id(&self) -> String {
        if let Some(id) = &self.client_id {
            return id.clone();
        }
        match hostname::get() {
            Ok(name) if !name.is_empty() => {
                format!("presence-reporter-{}", name.to_string_lossy())
            }
            _ => format!("presence-reporter-{}", uuid::Uuid::new_v4().simple()),
        }
    }
}

impl SensorConfig {
    /// Poll interval, `None` for on-demand sensors
    pub fn poll_interval(&self) -> Option<Duration> {
        crate::sensor::poll_interval(self.poll)
    }
}

impl ReporterConfig {
    /// Load config from `path`
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Parse and validate TOML text; `origin` is only used in error messages
    pub fn from_toml(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: ReporterConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get OS-specific config file path
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push("presence-reporter");
        path.push("config.toml");
        Ok(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, sensor) in self.sensors.iter().enumerate() {
            let invalid = |reason: String| ConfigError::InvalidSensor { index, reason };

            if sensor.address.trim().is_empty() {
                return Err(invalid("address is empty".into()));
            }
            if sensor.destination.trim().is_empty() {
                return Err(invalid("destination is empty".into()));
            }
            if !sensor.poll.is_finite() {
                return Err(invalid(format!("poll must be a number, got {}", sensor.poll)));
            }
            if sensor.poll > 0.0 && Duration::try_from_secs_f64(sensor.poll).is_err() {
                return Err(invalid(format!("poll of {} seconds is out of range", sensor.poll)));
            }
            if sensor.kind == SensorKind::Wifi && sensor.address.parse::<MacAddr>().is_err() {
                return Err(invalid(format!("{} is not a MAC address", sensor.address)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[logging]
level = "debug"

[mqtt]
host = "broker.local"
user = "sensor"
password = "secret"
request_topic = "presence/request"

[rest]
url = "http://openhab:8080/rest/items"

[[sensor]]
type = "wifi"
address = "AA:BB:CC:DD:EE:FF"
destination = "presence/phone"
poll = 10

[[sensor]]
type = "network"
address = "00:11:22:33:44:55"
destination = "Tablet_Presence"
report = "rest"
"#;

    #[test]
    fn test_default_config() {
        let config = ReporterConfig::default();
        assert_eq!(config.scheduler.tick(), Duration::from_millis(500));
        assert_eq!(config.scheduler.max_concurrent_checks, 16);
        assert_eq!(config.logging.level, "info");
        assert!(config.sensors.is_empty());
        assert_eq!(MqttConfig::default().port, 1883);
    }

    #[test]
    fn test_parse_sample() {
        let config = ReporterConfig::from_toml(SAMPLE, "sample").unwrap();
        assert_eq!(config.logging.level, "debug");

        let mqtt = config.mqtt.as_ref().unwrap();
        assert_eq!(mqtt.host, "broker.local");
        assert_eq!(mqtt.port, 1883);
        assert_eq!(mqtt.request_topic.as_deref(), Some("presence/request"));

        assert_eq!(config.sensors.len(), 2);
        assert_eq!(config.sensors[0].kind, SensorKind::Wifi);
        assert_eq!(config.sensors[0].report, ReportType::Mqtt);
        assert_eq!(config.sensors[0].poll_interval(), Some(Duration::from_secs(10)));
        assert_eq!(config.sensors[1].kind, SensorKind::Wifi);
        assert_eq!(config.sensors[1].report, ReportType::Rest);
        assert_eq!(config.sensors[1].poll_interval(), None);
        assert_eq!(config.rest.as_ref().unwrap().timeout_secs, 10);
    }

    #[test]
    fn test_invalid_sensor_rejected() {
        let text = r#"
[[sensor]]
type = "wifi"
address = "not-a-mac"
destination = "x"
"#;
        let err = ReporterConfig::from_toml(text, "bad").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSensor { index: 0, .. }));

        let text = r#"
[[sensor]]
type = "wifi"
address = "aa:bb:cc:dd:ee:ff"
destination = " "
"#;
        assert!(ReporterConfig::from_toml(text, "bad").is_err());
    }

    #[test]
    fn test_out_of_range_poll_rejected() {
        let text = r#"
[[sensor]]
type = "wifi"
address = "aa:bb:cc:dd:ee:ff"
destination = "presence/phone"
poll = 1e20
"#;
        let err = ReporterConfig::from_toml(text, "huge").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSensor { index: 0, .. }));

        let config = ReporterConfig::from_toml(&text.replace("1e20", "86400"), "day").unwrap();
        assert_eq!(config.sensors[0].poll_interval(), Some(Duration::from_secs(86400)));
    }

    #[test]
    fn test_explicit_client_id() {
        let config = MqttConfig {
            client_id: Some("kitchen-pi".into()),
            ..Default::default()
        };
        assert_eq!(config.effective_client_id(), "kitchen-pi");
        assert!(MqttConfig::default()
            .effective_client_id()
            .starts_with("presence-reporter-"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let config = ReporterConfig::load(&path).await.unwrap();
        assert_eq!(config.sensors.len(), 2);

        let missing = ReporterConfig::load(&dir.path().join("missing.toml")).await;
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_file_path() {
        if let Ok(path) = ReporterConfig::default_path() {
            assert!(path.to_string_lossy().contains("presence-reporter"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }
}
