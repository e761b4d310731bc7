//! MQTT bridge for UDP datagrams reported on a device console.
//!
//! The radio device (e.g. an nRF52840 running a Thread CLI) exposes a text
//! console over serial. This bridge tells it to open a UDP listener on port
//! 1212, watches the console for the lines it prints for every received
//! datagram and republishes their payload to an MQTT topic.
//!
//! # Payload format
//!
//! ```text
//! > 5 bytes from fe80::1 49154 42;17;99   ->   "42 17 99"
//! ```
//!
//! The last token of a notification line is published with every `;`
//! replaced by a space.

pub mod bridge;
pub mod config;
pub mod console;

pub use bridge::{Bridge, BridgeStats};
pub use config::{ConsoleBridgeConfig, Overrides};
