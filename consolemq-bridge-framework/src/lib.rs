//! consolemq Bridge Framework
//!
//! Common abstractions for bridges that drive a device console over a serial
//! line and republish what it reports to an MQTT broker.
//!
//! # Overview
//!
//! This framework provides:
//! - [`Transport`] and [`SerialTransport`] for the line-oriented device console
//! - [`Publisher`] and [`MqttPublisher`] for the broker connection
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`runner`] for logging setup, opening collaborators, release and
//!   shutdown signal handling
//! - [`mock`] collaborators for tests
//!
//! # Example
//!
//! ```ignore
//! use consolemq_bridge_framework::{runner, BridgeConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MyBridgeConfig::load("mybridge.json5")?;
//!     let (transport, publisher) = runner::open_collaborators(&config).await?;
//!
//!     match runner::run_until_shutdown(my_loop(&mut transport, &mut publisher), runner::ctrl_c()).await {
//!         runner::Outcome::Interrupted => {}
//!         runner::Outcome::Finished(result) => result?,
//!     }
//!
//!     runner::release(transport, publisher).await;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod error;
pub mod mock;
mod publisher;
pub mod runner;
mod transport;

pub use args::BridgeArgs;
pub use config::{BridgeConfig, validate_collaborators};
pub use error::{BridgeError, Result};
pub use publisher::{KEEP_ALIVE, MqttPublisher, Publisher};
pub use runner::Outcome;
pub use transport::{SerialTransport, Transport};

// Re-export commonly used types from consolemq-common
pub use consolemq_common::{LogFormat, LoggingConfig, MqttConfig, SerialConfig};
