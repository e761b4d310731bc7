//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// The serial device could not be opened.
    #[error("Cannot find or use device at port {port}: {message}")]
    SerialOpen { port: String, message: String },

    /// Reading from or writing to the console failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Broker connection could not be established or re-established.
    #[error("MQTT connection error: {0}")]
    MqttConnection(String),

    /// Publishing error.
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    /// A broker round-trip did not finish in time.
    #[error("Timed out after {secs}s waiting for {operation}")]
    Timeout { operation: &'static str, secs: u64 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

impl From<rumqttc::ConnectionError> for BridgeError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        Self::MqttConnection(err.to_string())
    }
}

impl From<consolemq_common::Error> for BridgeError {
    fn from(err: consolemq_common::Error) -> Self {
        match err {
            consolemq_common::Error::Config(msg) => Self::Config(msg),
            consolemq_common::Error::Parse(msg) => Self::ConfigParse(msg),
        }
    }
}
