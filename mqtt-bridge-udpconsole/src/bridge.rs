//! Console-to-MQTT bridge.
//!
//! [`Bridge`] owns an open [`Transport`] and a connected [`Publisher`]. It
//! brings the device console up, then polls it forever: poke the console,
//! read a batch of lines, and republish the payload of every datagram
//! notification. Pacing comes from the transport's read timeout alone.

use std::future::Future;

use consolemq_bridge_framework::runner::{self, Outcome};
use consolemq_bridge_framework::{Publisher, Result, Transport};
use tracing::{debug, info};

use crate::console::{self, BRING_UP, ConsoleLine, ConsoleStep, POKE};

/// Counters kept over the lifetime of a bridge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStats {
    /// Poll iterations that read a batch.
    pub iterations: u64,
    /// Decoded, noise-free lines classified.
    pub lines: u64,
    /// Payloads published.
    pub published: u64,
    /// Lines that were not datagram notifications.
    pub ignored: u64,
    /// Batches dropped because they could not be decoded.
    pub discarded_batches: u64,
}

/// Bridges datagram notifications from a device console to a topic.
pub struct Bridge<T: Transport, P: Publisher> {
    transport: T,
    publisher: P,
    topic: String,
    stats: BridgeStats,
}

impl<T: Transport, P: Publisher> Bridge<T, P> {
    /// Create a bridge over already opened collaborators.
    pub fn new(transport: T, publisher: P, topic: impl Into<String>) -> Self {
        Self {
            transport,
            publisher,
            topic: topic.into(),
            stats: BridgeStats::default(),
        }
    }

    /// Topic payloads are published to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Counters so far.
    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Put the console into UDP listening mode.
    ///
    /// Runs the steps of [`BRING_UP`] in order without looking at any reply.
    /// The first failing step aborts bring-up.
    pub async fn bring_up(&mut self) -> Result<()> {
        info!("Opening UDP listener on device console");

        for step in BRING_UP {
            match step {
                ConsoleStep::ClearInput => self.transport.clear_input().await?,
                ConsoleStep::Send(command) => self.send(command).await?,
            }
        }

        info!("Device console is listening for UDP datagrams");
        Ok(())
    }

    /// Run one poke-read-classify-publish iteration.
    ///
    /// Returns the number of payloads published. An undecodable batch is
    /// dropped as a whole and is not an error.
    pub async fn poll_once(&mut self) -> Result<usize> {
        self.send(POKE).await?;
        let raw = self.transport.read_lines().await?;
        self.stats.iterations += 1;

        let lines = match console::decode_batch(&raw) {
            Ok(lines) => lines,
            Err(e) => {
                debug!(error = %e, lines = raw.len(), "Discarding console batch");
                self.stats.discarded_batches += 1;
                return Ok(0);
            }
        };

        let mut published = 0;
        for line in &lines {
            self.stats.lines += 1;

            match console::classify(line) {
                ConsoleLine::Datagram(payload) => {
                    self.publisher.reconnect().await?;
                    self.publisher
                        .publish(&self.topic, payload.as_bytes())
                        .await?;

                    self.stats.published += 1;
                    published += 1;
                    debug!(topic = %self.topic, %payload, "Published datagram payload");
                }
                ConsoleLine::Other(text) => {
                    self.stats.ignored += 1;
                    debug!("{}", text);
                }
            }
        }

        Ok(published)
    }

    /// Poll the console until a collaborator fails.
    pub async fn run(&mut self) -> Result<()> {
        info!(topic = %self.topic, "Bridging console datagrams");

        loop {
            self.poll_once().await?;
        }
    }

    /// Bring the console up and poll it until `shutdown` resolves or a
    /// collaborator fails, then release both collaborators.
    ///
    /// Release happens exactly once on every path. Returns the final
    /// counters after an interrupt, or the error that stopped the bridge.
    pub async fn run_until<S>(mut self, shutdown: S) -> Result<BridgeStats>
    where
        S: Future<Output = ()>,
    {
        let outcome = runner::run_until_shutdown(
            async {
                self.bring_up().await?;
                self.run().await
            },
            shutdown,
        )
        .await;

        let stats = self.release().await;

        match outcome {
            Outcome::Interrupted | Outcome::Finished(Ok(())) => Ok(stats),
            Outcome::Finished(Err(e)) => Err(e),
        }
    }

    /// Close the transport and disconnect the publisher.
    pub async fn release(self) -> BridgeStats {
        let Self {
            transport,
            publisher,
            stats,
            ..
        } = self;

        info!(
            iterations = stats.iterations,
            lines = stats.lines,
            published = stats.published,
            ignored = stats.ignored,
            discarded_batches = stats.discarded_batches,
            "Releasing console and broker connections"
        );

        runner::release(transport, publisher).await;
        stats
    }

    async fn send(&mut self, command: &str) -> Result<()> {
        debug!(command, "Sending console command");
        self.transport
            .write(&console::encode_command(command))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consolemq_bridge_framework::mock::{Call, CallLog, MockPublisher, MockTransport};

    fn write(text: &str) -> Call {
        Call::Write(text.to_string())
    }

    fn bridge<L: AsRef<[u8]>>(
        log: &CallLog,
        batches: Vec<Vec<L>>,
    ) -> Bridge<MockTransport, MockPublisher> {
        Bridge::new(
            MockTransport::new(log.clone(), batches),
            MockPublisher::new(log.clone()),
            "test",
        )
    }

    #[tokio::test]
    async fn test_bring_up_order() {
        let log = CallLog::new();
        let mut bridge = bridge(&log, Vec::<Vec<&str>>::new());

        bridge.bring_up().await.unwrap();

        assert_eq!(
            log.calls(),
            vec![
                Call::ClearInput,
                write("\r\n"),
                write("udp open\r\n"),
                write("udp bind :: 1212\r\n"),
                Call::ClearInput,
                write("ipaddr\r\n"),
            ]
        );
    }

    #[tokio::test]
    async fn test_bring_up_stops_at_first_failure() {
        let log = CallLog::new();
        let empty: Vec<Vec<&str>> = Vec::new();
        let mut bridge = Bridge::new(
            MockTransport::new(log.clone(), empty).fail_write_at(1),
            MockPublisher::new(log.clone()),
            "test",
        );

        assert!(bridge.bring_up().await.is_err());
        assert_eq!(log.calls(), vec![Call::ClearInput, write("\r\n")]);
    }

    #[tokio::test]
    async fn test_poll_once_publishes_notification() {
        let log = CallLog::new();
        let mut bridge = bridge(&log, vec![vec!["> 5 bytes from fe80::1 42;17;99\r\n"]]);

        assert_eq!(bridge.poll_once().await.unwrap(), 1);

        assert_eq!(
            log.calls(),
            vec![
                write("\r\n"),
                Call::ReadLines,
                Call::Reconnect,
                Call::Publish {
                    topic: "test".to_string(),
                    payload: "42 17 99".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_poll_once_ignores_other_lines() {
        let log = CallLog::new();
        let mut bridge = bridge(
            &log,
            vec![vec!["Listening on port 1212\r\n", "> \r\n", "\r\n", "> "]],
        );

        assert_eq!(bridge.poll_once().await.unwrap(), 0);

        assert_eq!(log.count(|c| matches!(c, Call::Publish { .. })), 0);
        assert_eq!(log.count(|c| *c == Call::Reconnect), 0);
        assert_eq!(bridge.stats().ignored, 1);
        assert_eq!(bridge.stats().lines, 1);
    }

    #[tokio::test]
    async fn test_poll_once_discards_undecodable_batch() {
        let log = CallLog::new();
        let mut bridge = bridge(
            &log,
            vec![vec![
                b"4 bytes from fe80::1 1;2\r\n".as_slice(),
                b"\xc3\x28\r\n".as_slice(),
            ]],
        );

        assert_eq!(bridge.poll_once().await.unwrap(), 0);

        assert!(log.published().is_empty());
        assert_eq!(bridge.stats().discarded_batches, 1);
        assert_eq!(bridge.stats().iterations, 1);
    }

    #[tokio::test]
    async fn test_poll_once_propagates_reconnect_failure() {
        let log = CallLog::new();
        let mut bridge = Bridge::new(
            MockTransport::new(log.clone(), vec![vec!["1 bytes from ::1 x\r\n"]]),
            MockPublisher::new(log.clone()).failing_reconnect(),
            "test",
        );

        assert!(bridge.poll_once().await.is_err());
        assert!(log.published().is_empty());
    }

    #[tokio::test]
    async fn test_release_returns_stats() {
        let log = CallLog::new();
        let mut bridge = bridge(&log, vec![vec!["2 bytes from ::1 a;b\r\n"]]);
        bridge.poll_once().await.unwrap();

        let stats = bridge.release().await;

        assert_eq!(stats.published, 1);
        assert_eq!(log.count(|c| *c == Call::Close), 1);
        assert_eq!(log.count(|c| *c == Call::Disconnect), 1);
    }
}
