//! Publish-capable broker client.
//!
//! [`Publisher`] is handed to a bridge already connected. The bridge only
//! issues [`reconnect`](Publisher::reconnect) and [`publish`](Publisher::publish)
//! calls and finally releases it with [`disconnect`](Publisher::disconnect).

use std::future::Future;
#[cfg(any(target_os = "linux", target_os = "android", target_os = "fuchsia"))]
use std::net::IpAddr;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tracing::{debug, info, warn};

use crate::MqttConfig;
use crate::error::{BridgeError, Result};

/// Keep-alive interval announced to the broker.
pub const KEEP_ALIVE: Duration = Duration::from_secs(1);

/// Capacity of the request channel between client and event loop.
const REQUEST_CAPACITY: usize = 10;

/// A broker client with explicit reconnect/publish/disconnect operations.
#[allow(async_fn_in_trait)]
pub trait Publisher {
    /// Drop the current broker connection and establish a fresh one.
    async fn reconnect(&mut self) -> Result<()>;

    /// Publish `payload` on `topic`, at most once.
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()>;

    /// Release the broker connection.
    async fn disconnect(self) -> Result<()>
    where
        Self: Sized;
}

/// MQTT publisher backed by `rumqttc`.
///
/// The event loop is driven inline by each operation instead of a background
/// task, so the connection only does work when the bridge asks it to.
pub struct MqttPublisher {
    client: AsyncClient,
    eventloop: EventLoop,
    broker: String,
    op_timeout: Duration,
}

impl MqttPublisher {
    /// Connect to the broker described by `config`.
    ///
    /// Credentials are applied before connecting when a username is given.
    pub async fn connect(config: &MqttConfig) -> Result<Self> {
        let host = config
            .broker
            .clone()
            .ok_or_else(|| BridgeError::validation("MQTT broker address is required"))?;

        let mut options = MqttOptions::new(&config.client_id, &host, config.port);
        options.set_keep_alive(KEEP_ALIVE);

        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.clone().unwrap_or_default());
        }

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        if let Some(interface) = &config.interface {
            bind_interface(&mut eventloop, interface)?;
        }

        let mut publisher = Self {
            client,
            eventloop,
            broker: format!("{}:{}", host, config.port),
            op_timeout: config.operation_timeout(),
        };

        info!(
            broker = %publisher.broker,
            client_id = %config.client_id,
            "Connecting to MQTT broker"
        );
        publisher.await_connack().await?;
        info!(broker = %publisher.broker, "Connected to MQTT broker");

        Ok(publisher)
    }

    /// Broker address as `host:port`.
    pub fn broker(&self) -> &str {
        &self.broker
    }

    async fn await_connack(&mut self) -> Result<()> {
        let eventloop = &mut self.eventloop;
        with_timeout(self.op_timeout, "CONNACK", async {
            loop {
                if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
                    return Ok::<(), BridgeError>(());
                }
            }
        })
        .await
    }

    async fn await_outgoing(
        &mut self,
        operation: &'static str,
        done: fn(&Outgoing) -> bool,
    ) -> Result<()> {
        let eventloop = &mut self.eventloop;
        with_timeout(self.op_timeout, operation, async {
            loop {
                if let Event::Outgoing(outgoing) = eventloop.poll().await? {
                    if done(&outgoing) {
                        return Ok::<(), BridgeError>(());
                    }
                }
            }
        })
        .await
    }
}

impl Publisher for MqttPublisher {
    async fn reconnect(&mut self) -> Result<()> {
        self.eventloop.clean();
        self.await_connack().await?;
        debug!(broker = %self.broker, "Reconnected to MQTT broker");
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })?;

        self.await_outgoing("PUBLISH", |outgoing| matches!(outgoing, Outgoing::Publish(_)))
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    async fn disconnect(mut self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| BridgeError::MqttConnection(e.to_string()))?;

        self.await_outgoing("DISCONNECT", |outgoing| {
            matches!(outgoing, Outgoing::Disconnect)
        })
        .await?;

        info!(broker = %self.broker, "Disconnected from MQTT broker");
        Ok(())
    }
}

/// Bind the broker connection to a local interface.
///
/// `interface` is either an interface name or one of its IP addresses.
#[cfg(any(target_os = "linux", target_os = "android", target_os = "fuchsia"))]
fn bind_interface(eventloop: &mut EventLoop, interface: &str) -> Result<()> {
    let device = bind_device_name(interface)?;
    debug!(%interface, %device, "Binding broker connection to interface");

    let mut network = rumqttc::NetworkOptions::new();
    network.set_bind_device(&device);
    eventloop.set_network_options(network);
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "fuchsia")))]
fn bind_interface(_eventloop: &mut EventLoop, interface: &str) -> Result<()> {
    warn!(%interface, "Binding to an interface is not supported on this platform, ignoring");
    Ok(())
}

/// Name of the interface to bind to.
///
/// An IP address is looked up among the local interfaces, anything else is
/// taken as an interface name.
#[cfg(any(target_os = "linux", target_os = "android", target_os = "fuchsia"))]
fn bind_device_name(interface: &str) -> Result<String> {
    let Ok(address) = interface.parse::<IpAddr>() else {
        return Ok(interface.to_string());
    };

    if_addrs::get_if_addrs()?
        .into_iter()
        .find(|candidate| candidate.ip() == address)
        .map(|candidate| candidate.name)
        .ok_or_else(|| BridgeError::validation(format!("no local interface has address {}", address)))
}

async fn with_timeout<F>(limit: Duration, operation: &'static str, future: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, "MQTT operation timed out");
            Err(BridgeError::Timeout {
                operation,
                secs: limit.as_secs(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
    const PINGRESP: [u8; 2] = [0xd0, 0x00];

    /// What the in-process broker saw.
    #[derive(Debug, PartialEq, Eq)]
    enum BrokerEvent {
        Connected,
        Published { topic: String, payload: Vec<u8> },
        Disconnected,
    }

    /// Minimal MQTT 3.1.1 broker accepting any number of connections.
    async fn spawn_broker() -> (SocketAddr, mpsc::UnboundedReceiver<BrokerEvent>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_client(stream, tx.clone()));
            }
        });

        (addr, rx)
    }

    async fn read_packet(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
        let header = stream.read_u8().await.ok()?;

        let mut remaining = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await.ok()?;
            remaining |= usize::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }

        let mut body = vec![0u8; remaining];
        stream.read_exact(&mut body).await.ok()?;
        Some((header >> 4, body))
    }

    async fn serve_client(mut stream: TcpStream, events: mpsc::UnboundedSender<BrokerEvent>) {
        while let Some((packet_type, body)) = read_packet(&mut stream).await {
            match packet_type {
                // CONNECT
                1 => {
                    let _ = events.send(BrokerEvent::Connected);
                    if stream.write_all(&CONNACK).await.is_err() {
                        return;
                    }
                }
                // PUBLISH at QoS 0: topic length, topic, payload
                3 => {
                    let topic_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
                    let topic = String::from_utf8_lossy(&body[2..2 + topic_len]).into_owned();
                    let payload = body[2 + topic_len..].to_vec();
                    let _ = events.send(BrokerEvent::Published { topic, payload });
                }
                // PINGREQ
                12 => {
                    if stream.write_all(&PINGRESP).await.is_err() {
                        return;
                    }
                }
                // DISCONNECT
                14 => {
                    let _ = events.send(BrokerEvent::Disconnected);
                    return;
                }
                _ => {}
            }
        }
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<BrokerEvent>) -> BrokerEvent {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("broker event in time")
            .expect("broker still running")
    }

    fn local_broker(addr: SocketAddr) -> MqttConfig {
        MqttConfig {
            broker: Some(addr.ip().to_string()),
            port: addr.port(),
            timeout_secs: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result =
            with_timeout(Duration::from_millis(10), "CONNACK", std::future::pending()).await;

        match result {
            Err(BridgeError::Timeout { operation, .. }) => assert_eq!(operation, "CONNACK"),
            other => panic!("Expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let ok = with_timeout(Duration::from_secs(1), "PUBLISH", async { Ok::<(), BridgeError>(()) }).await;
        assert!(ok.is_ok());

        let err = with_timeout(Duration::from_secs(1), "PUBLISH", async {
            Err::<(), _>(BridgeError::MqttConnection("refused".to_string()))
        })
        .await;
        assert!(matches!(err, Err(BridgeError::MqttConnection(_))));
    }

    #[tokio::test]
    async fn test_connect_requires_broker() {
        let config = MqttConfig::default();
        let result = MqttPublisher::connect(&config).await;
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[tokio::test]
    async fn test_connect_unreachable_broker_fails() {
        let config = MqttConfig {
            broker: Some("127.0.0.1".to_string()),
            port: 1,
            timeout_secs: 2,
            ..Default::default()
        };

        assert!(MqttPublisher::connect(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_reconnect_then_publish_reaches_broker() {
        let (addr, mut events) = spawn_broker().await;

        let mut publisher = MqttPublisher::connect(&local_broker(addr)).await.unwrap();
        assert_eq!(next_event(&mut events).await, BrokerEvent::Connected);
        assert_eq!(publisher.broker(), addr.to_string());

        publisher.reconnect().await.unwrap();
        assert_eq!(
            next_event(&mut events).await,
            BrokerEvent::Connected,
            "reconnect opens a fresh session"
        );

        publisher.publish("sensors", b"42 17 99").await.unwrap();
        assert_eq!(
            next_event(&mut events).await,
            BrokerEvent::Published {
                topic: "sensors".to_string(),
                payload: b"42 17 99".to_vec(),
            }
        );

        publisher.disconnect().await.unwrap();
        assert_eq!(next_event(&mut events).await, BrokerEvent::Disconnected);
    }

    #[tokio::test]
    async fn test_every_reconnect_opens_a_connection() {
        let (addr, mut events) = spawn_broker().await;

        let mut publisher = MqttPublisher::connect(&local_broker(addr)).await.unwrap();
        for _ in 0..3 {
            publisher.reconnect().await.unwrap();
            publisher.publish("test", b"x").await.unwrap();
        }
        publisher.disconnect().await.unwrap();

        // Connections are served concurrently, so only totals are compared.
        let (mut connects, mut publishes, mut disconnected) = (0, 0, false);
        while connects < 4 || publishes < 3 || !disconnected {
            match next_event(&mut events).await {
                BrokerEvent::Connected => connects += 1,
                BrokerEvent::Published { .. } => publishes += 1,
                BrokerEvent::Disconnected => disconnected = true,
            }
        }
        assert_eq!(connects, 4);
        assert_eq!(publishes, 3);
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "fuchsia"))]
    #[test]
    fn test_bind_device_name_passes_names_through() {
        assert_eq!(bind_device_name("eth0").unwrap(), "eth0");
        assert_eq!(bind_device_name("wlan0").unwrap(), "wlan0");
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "fuchsia"))]
    #[test]
    fn test_bind_device_name_resolves_address() {
        let name = bind_device_name("127.0.0.1").unwrap();
        assert!(!name.is_empty());
        assert_ne!(name, "127.0.0.1");
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "fuchsia"))]
    #[test]
    fn test_bind_device_name_unknown_address() {
        // TEST-NET-3, never assigned to a local interface.
        let result = bind_device_name("203.0.113.77");
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "fuchsia"))]
    #[tokio::test]
    async fn test_connect_bound_to_interface_address() {
        let (addr, mut events) = spawn_broker().await;
        let config = MqttConfig {
            interface: Some("127.0.0.1".to_string()),
            ..local_broker(addr)
        };

        let publisher = MqttPublisher::connect(&config).await.unwrap();
        assert_eq!(next_event(&mut events).await, BrokerEvent::Connected);

        publisher.disconnect().await.unwrap();
    }
}
