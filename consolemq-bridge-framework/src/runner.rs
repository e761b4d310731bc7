//! Bridge lifecycle management.
//!
//! Handles:
//! - Logging initialization (with optional CLI override)
//! - Opening the serial transport and connecting the MQTT publisher
//! - Racing the bridge work against the operator's shutdown signal

use std::future::Future;

use tokio::signal;

use consolemq_common::{LoggingConfig, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::publisher::{MqttPublisher, Publisher};
use crate::transport::{SerialTransport, Transport};

/// How a bridge run came to an end.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The operator asked the bridge to stop.
    Interrupted,
    /// The bridge work finished on its own.
    Finished(T),
}

/// Initialize logging from the config, letting `--log-level` win.
pub fn init_logging<C: BridgeConfig>(config: &C, args: &BridgeArgs) -> Result<()> {
    let log_config = match args.log_level {
        Some(ref level) => LoggingConfig {
            level: level.clone(),
            format: config.logging().format,
        },
        None => config.logging().clone(),
    };

    init_tracing(&log_config)?;
    Ok(())
}

/// Open the serial transport and connect the MQTT publisher.
///
/// If the broker connection fails the already opened serial port is
/// released before the error is returned.
pub async fn open_collaborators<C: BridgeConfig>(
    config: &C,
) -> Result<(SerialTransport, MqttPublisher)> {
    let transport = SerialTransport::open(config.serial())?;

    match MqttPublisher::connect(config.mqtt()).await {
        Ok(publisher) => Ok((transport, publisher)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to MQTT broker");
            if let Err(close_err) = transport.close().await {
                tracing::warn!(error = %close_err, "Error closing serial port");
            }
            Err(e)
        }
    }
}

/// Release both collaborators, each exactly once.
///
/// Failures are logged and otherwise ignored.
pub async fn release<T: Transport, P: Publisher>(transport: T, publisher: P) {
    if let Err(e) = transport.close().await {
        tracing::warn!(error = %e, "Error closing transport");
    }

    if let Err(e) = publisher.disconnect().await {
        tracing::warn!(error = %e, "Error disconnecting publisher");
    }
}

/// Drive `work` until it finishes or `shutdown` resolves.
///
/// When the shutdown signal wins, `work` is dropped wherever it was
/// suspended.
pub async fn run_until_shutdown<F, S, T>(work: F, shutdown: S) -> Outcome<T>
where
    F: Future<Output = T>,
    S: Future<Output = ()>,
{
    tokio::select! {
        result = work => Outcome::Finished(result),
        () = shutdown => {
            tracing::info!("Received shutdown signal");
            Outcome::Interrupted
        }
    }
}

/// Resolve when the operator presses Ctrl+C.
///
/// Never resolves if the signal handler cannot be installed.
pub async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
