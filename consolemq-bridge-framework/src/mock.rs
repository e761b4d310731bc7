//! In-memory collaborators for exercising bridges without hardware.
//!
//! [`MockTransport`] replays scripted console batches and [`MockPublisher`]
//! records what would have gone to the broker. Both append to a shared
//! [`CallLog`] so tests can assert on the interleaving of calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{BridgeError, Result};
use crate::publisher::Publisher;
use crate::transport::Transport;

/// A single recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Write(String),
    ClearInput,
    ReadLines,
    Close,
    Reconnect,
    Publish { topic: String, payload: String },
    Disconnect,
}

/// Ordered, shared record of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    /// Snapshot of every call so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    /// Payloads published so far, in order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Publish { topic, payload } => Some((topic, payload)),
                _ => None,
            })
            .collect()
    }
}

/// What a [`MockTransport`] does once its script runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhausted {
    /// Fail the read, ending the bridge loop with an error.
    Fail,
    /// Keep returning empty batches, like a quiet console.
    Idle,
}

/// Scripted console.
#[derive(Debug)]
pub struct MockTransport {
    log: CallLog,
    batches: VecDeque<Vec<Vec<u8>>>,
    exhausted: Exhausted,
    fail_write_at: Option<usize>,
    writes: usize,
}

impl MockTransport {
    /// Create a transport that replays `batches`, one per read.
    pub fn new<I, B, L>(log: CallLog, batches: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let batches = batches
            .into_iter()
            .map(|batch| batch.into_iter().map(|l| l.as_ref().to_vec()).collect())
            .collect();

        Self {
            log,
            batches,
            exhausted: Exhausted::Fail,
            fail_write_at: None,
            writes: 0,
        }
    }

    /// Choose the behaviour once all scripted batches were read.
    pub fn when_exhausted(mut self, exhausted: Exhausted) -> Self {
        self.exhausted = exhausted;
        self
    }

    /// Make the write with the given zero-based index fail.
    pub fn fail_write_at(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }
}

impl Transport for MockTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let index = self.writes;
        self.writes += 1;

        if self.fail_write_at == Some(index) {
            return Err(BridgeError::transport("mock write failure"));
        }

        self.log
            .record(Call::Write(String::from_utf8_lossy(bytes).into_owned()));
        Ok(())
    }

    async fn read_lines(&mut self) -> Result<Vec<Vec<u8>>> {
        self.log.record(Call::ReadLines);

        match self.batches.pop_front() {
            Some(batch) => Ok(batch),
            None => match self.exhausted {
                Exhausted::Fail => Err(BridgeError::transport("mock console script exhausted")),
                Exhausted::Idle => {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    Ok(Vec::new())
                }
            },
        }
    }

    async fn clear_input(&mut self) -> Result<()> {
        self.log.record(Call::ClearInput);
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.log.record(Call::Close);
        Ok(())
    }
}

/// Recording broker client.
#[derive(Debug)]
pub struct MockPublisher {
    log: CallLog,
    fail_reconnect: bool,
    hang_on_publish: Option<(usize, Arc<Notify>)>,
    publishes: usize,
}

impl MockPublisher {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail_reconnect: false,
            hang_on_publish: None,
            publishes: 0,
        }
    }

    /// Make every reconnect fail as if the broker were unreachable.
    pub fn failing_reconnect(mut self) -> Self {
        self.fail_reconnect = true;
        self
    }

    /// Record the publish with the given zero-based index, signal `reached`,
    /// then never complete.
    pub fn hang_on_publish(mut self, index: usize, reached: Arc<Notify>) -> Self {
        self.hang_on_publish = Some((index, reached));
        self
    }
}

impl Publisher for MockPublisher {
    async fn reconnect(&mut self) -> Result<()> {
        self.log.record(Call::Reconnect);
        if self.fail_reconnect {
            return Err(BridgeError::MqttConnection("mock broker unreachable".to_string()));
        }
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        let index = self.publishes;
        self.publishes += 1;

        self.log.record(Call::Publish {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        });

        if let Some((hang_at, reached)) = &self.hang_on_publish {
            if *hang_at == index {
                reached.notify_one();
                std::future::pending::<()>().await;
            }
        }

        Ok(())
    }

    async fn disconnect(self) -> Result<()> {
        self.log.record(Call::Disconnect);
        Ok(())
    }
}
