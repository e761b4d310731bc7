//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, MqttConfig, SerialConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// loading, validation, and access to the collaborator settings.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use consolemq_bridge_framework::{BridgeConfig, LoggingConfig, MqttConfig, SerialConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub serial: SerialConfig,
///     pub mqtt: MqttConfig,
///     pub logging: LoggingConfig,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn serial(&self) -> &SerialConfig { &self.serial }
///     fn mqtt(&self) -> &MqttConfig { &self.mqtt }
///     fn logging(&self) -> &LoggingConfig { &self.logging }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the serial console configuration.
    fn serial(&self) -> &SerialConfig;

    /// Get the MQTT broker configuration.
    fn mqtt(&self) -> &MqttConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Validate the configuration.
    ///
    /// The default checks everything needed to open both collaborators.
    /// Override to add custom validation, calling [`validate_collaborators`].
    fn validate(&self) -> Result<()> {
        validate_collaborators(self.serial(), self.mqtt())
    }

    /// Load configuration from a file path without validating it.
    ///
    /// Supports JSON5 format. Validation is left to the caller because
    /// command line overrides are usually merged in first.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        Ok(consolemq_common::load_config(path)?)
    }
}

/// Check the settings both collaborators need before they can be opened.
pub fn validate_collaborators(serial: &SerialConfig, mqtt: &MqttConfig) -> Result<()> {
    match serial.port.as_deref() {
        Some(port) if !port.trim().is_empty() => {}
        _ => return Err(BridgeError::validation("serial port is required")),
    }

    if serial.baud_rate == 0 {
        return Err(BridgeError::validation("baud rate must be greater than 0"));
    }

    match mqtt.broker.as_deref() {
        Some(broker) if !broker.trim().is_empty() => {}
        _ => return Err(BridgeError::validation("MQTT broker address is required")),
    }

    if mqtt.topic.is_empty() {
        return Err(BridgeError::validation("MQTT topic cannot be empty"));
    }

    if mqtt.client_id.is_empty() {
        return Err(BridgeError::validation("MQTT client id cannot be empty"));
    }

    Ok(())
}
