use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Read timeout used when the configured one is zero.
pub const FALLBACK_READ_TIMEOUT_SECS: u64 = 10;

/// Serial console connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path, e.g. "/dev/ttyACM0". Required.
    #[serde(default)]
    pub port: Option<String>,

    /// Baud rate (default: 115200).
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Read timeout in seconds (default: 2). Zero falls back to 10.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_timeout_secs() -> u64 {
    2
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SerialConfig {
    /// Effective read timeout.
    pub fn read_timeout(&self) -> Duration {
        match self.timeout_secs {
            0 => Duration::from_secs(FALLBACK_READ_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or IP address. Required.
    #[serde(default)]
    pub broker: Option<String>,

    /// Broker port (default: 1883).
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Local interface, by IP address or name, to bind the broker connection
    /// to (default: any).
    #[serde(default)]
    pub interface: Option<String>,

    /// MQTT client identifier (default: "P1").
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Username for broker authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Password for broker authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Topic payloads are published to (default: "test").
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Upper bound for a single broker round-trip in seconds (default: 10).
    #[serde(default = "default_operation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "P1".to_string()
}

fn default_topic() -> String {
    "test".to_string()
}

fn default_operation_timeout_secs() -> u64 {
    10
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: None,
            port: default_mqtt_port(),
            interface: None,
            client_id: default_client_id(),
            username: None,
            password: None,
            topic: default_topic(),
            timeout_secs: default_operation_timeout_secs(),
        }
    }
}

impl MqttConfig {
    /// Timeout applied to connect, publish and disconnect round-trips.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Load a configuration file in JSON5 format.
pub fn load_config<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    json5::from_str(&content).map_err(|e| Error::Parse(format!("'{}': {}", path.display(), e)))
}
