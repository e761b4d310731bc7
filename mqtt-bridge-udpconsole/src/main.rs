//! MQTT bridge for UDP datagrams reported on a device console.
//!
//! Drives the device console into UDP listening mode and republishes every
//! received datagram's payload to an MQTT topic until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use consolemq_bridge_framework::{BridgeArgs, runner};
use mqtt_bridge_udpconsole::{Bridge, ConsoleBridgeConfig, Overrides};
use tracing::info;

/// Bridge UDP datagrams from a radio device's serial console to MQTT.
#[derive(Parser, Debug)]
#[command(name = "mqtt-bridge-udpconsole")]
#[command(about = "Republishes UDP datagrams reported on a device console to MQTT")]
#[command(version)]
struct Args {
    #[command(flatten)]
    bridge: BridgeArgs,

    #[command(flatten)]
    overrides: Overrides,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = ConsoleBridgeConfig::resolve(&args.bridge, &args.overrides)
        .context("Invalid configuration")?;

    // Initialize logging
    runner::init_logging(&config, &args.bridge)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting mqtt-bridge-udpconsole");
    if let Some(path) = &args.bridge.config {
        info!("Loaded configuration from {:?}", path);
    }

    let (transport, publisher) = runner::open_collaborators(&config)
        .await
        .context("Failed to set up the serial console and MQTT broker")?;
    info!(
        serial = %transport.path(),
        broker = %publisher.broker(),
        "Console and broker ready"
    );

    let bridge = Bridge::new(transport, publisher, config.mqtt.topic.clone());
    let stats = bridge
        .run_until(runner::ctrl_c())
        .await
        .context("Bridge stopped")?;

    info!(published = stats.published, "UDP console bridge stopped");

    Ok(())
}
