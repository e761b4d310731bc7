//! Line-oriented console transport.
//!
//! [`Transport`] is the seam between a bridge and the device console. The
//! bridge never opens or configures the transport itself; it receives one that
//! is already open and releases it with [`Transport::close`].

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_serial::{ClearBuffer, SerialPort, SerialStream};
use tracing::{debug, error};

use crate::SerialConfig;
use crate::error::{BridgeError, Result};

/// A read/write console connection that hands out input one line at a time.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Write raw bytes to the console.
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read every line currently available.
    ///
    /// Each element keeps its line terminator. The last element may be a
    /// partial line if the read timeout expired before its terminator
    /// arrived. Returns an empty batch when nothing arrived in time.
    async fn read_lines(&mut self) -> Result<Vec<Vec<u8>>>;

    /// Discard any input received but not yet read.
    async fn clear_input(&mut self) -> Result<()>;

    /// Release the connection.
    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Serial port transport backed by `tokio-serial`.
pub struct SerialTransport {
    port: BufReader<SerialStream>,
    path: String,
    read_timeout: Duration,
}

impl SerialTransport {
    /// Open the serial device described by `config`.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let path = config
            .port
            .clone()
            .ok_or_else(|| BridgeError::validation("serial port is required"))?;
        let read_timeout = config.read_timeout();

        let builder = tokio_serial::new(&path, config.baud_rate).timeout(read_timeout);

        let stream = SerialStream::open(&builder).map_err(|e| {
            error!("Cannot find or use device at port {}", path);
            BridgeError::SerialOpen {
                port: path.clone(),
                message: e.to_string(),
            }
        })?;

        debug!(
            port = %path,
            baud_rate = config.baud_rate,
            timeout_secs = read_timeout.as_secs(),
            "Port open"
        );

        Ok(Self {
            port: BufReader::new(stream),
            path,
            read_timeout,
        })
    }

    /// Device path this transport was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Transport for SerialTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.port.get_mut();
        stream
            .write_all(bytes)
            .await
            .map_err(|e| BridgeError::transport(format!("write to {} failed: {}", self.path, e)))?;
        stream
            .flush()
            .await
            .map_err(|e| BridgeError::transport(format!("flush of {} failed: {}", self.path, e)))?;
        Ok(())
    }

    async fn read_lines(&mut self) -> Result<Vec<Vec<u8>>> {
        read_lines_until_idle(&mut self.port, self.read_timeout).await
    }

    async fn clear_input(&mut self) -> Result<()> {
        let buffered = self.port.buffer().len();
        self.port.consume(buffered);

        self.port
            .get_ref()
            .clear(ClearBuffer::Input)
            .map_err(|e| BridgeError::transport(format!("clear of {} failed: {}", self.path, e)))
    }

    async fn close(self) -> Result<()> {
        drop(self.port);
        debug!(port = %self.path, "Serial port closed");
        Ok(())
    }
}

/// Collect lines until a read waits `idle` without completing a line.
///
/// Bytes of an unterminated line are kept and returned as the final element.
async fn read_lines_until_idle<R>(reader: &mut R, idle: Duration) -> Result<Vec<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();

    loop {
        let mut line = Vec::new();
        match tokio::time::timeout(idle, reader.read_until(b'\n', &mut line)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(_)) => {
                let terminated = line.ends_with(b"\n");
                lines.push(line);
                if !terminated {
                    break;
                }
            }
            Ok(Err(e)) => return Err(BridgeError::transport(format!("read failed: {}", e))),
            Err(_) => {
                if !line.is_empty() {
                    lines.push(line);
                }
                break;
            }
        }
    }

    Ok(lines)
}
