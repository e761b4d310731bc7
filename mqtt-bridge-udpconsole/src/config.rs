//! Configuration for the UDP console bridge.

use clap::Args;
use consolemq_bridge_framework::{
    BridgeArgs, BridgeConfig, LoggingConfig, MqttConfig, Result, SerialConfig,
};
use serde::{Deserialize, Serialize};

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleBridgeConfig {
    /// Serial console settings
    #[serde(default)]
    pub serial: SerialConfig,

    /// MQTT broker settings
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig for ConsoleBridgeConfig {
    fn serial(&self) -> &SerialConfig {
        &self.serial
    }

    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }
}

/// Command line settings that override the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Serial port the radio device is attached to, e.g. /dev/ttyACM0.
    #[arg(short = 's', long = "serial")]
    pub serial: Option<String>,

    /// Serial baud rate [default: 115200].
    #[arg(long)]
    pub speed: Option<u32>,

    /// Serial read timeout in seconds, 0 means 10 [default: 2].
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Address of the MQTT broker.
    #[arg(short = 'b', long)]
    pub broker: Option<String>,

    /// IP address or name of the local interface used to reach the broker
    /// [default: any].
    #[arg(long)]
    pub interface: Option<String>,

    /// Broker port [default: 1883].
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Username for broker authentication.
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Password for broker authentication.
    #[arg(long)]
    pub password: Option<String>,

    /// Topic datagram payloads are published to [default: test].
    #[arg(long, visible_alias = "channel")]
    pub topic: Option<String>,
}

impl ConsoleBridgeConfig {
    /// Build the effective configuration.
    ///
    /// Starts from the configuration file if one was given (defaults
    /// otherwise), applies the command line overrides and validates the
    /// result.
    pub fn resolve(args: &BridgeArgs, overrides: &Overrides) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply command line overrides on top of this configuration.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(port) = &overrides.serial {
            self.serial.port = Some(port.clone());
        }
        if let Some(speed) = overrides.speed {
            self.serial.baud_rate = speed;
        }
        if let Some(timeout) = overrides.timeout {
            self.serial.timeout_secs = timeout;
        }
        if let Some(broker) = &overrides.broker {
            self.mqtt.broker = Some(broker.clone());
        }
        if let Some(interface) = &overrides.interface {
            self.mqtt.interface = Some(interface.clone());
        }
        if let Some(port) = overrides.port {
            self.mqtt.port = port;
        }
        if let Some(user) = &overrides.user {
            self.mqtt.username = Some(user.clone());
        }
        if let Some(password) = &overrides.password {
            self.mqtt.password = Some(password.clone());
        }
        if let Some(topic) = &overrides.topic {
            self.mqtt.topic = topic.clone();
        }

        // An empty interface means "any".
        if self.mqtt.interface.as_deref().is_some_and(str::is_empty) {
            self.mqtt.interface = None;
        }
    }
}
