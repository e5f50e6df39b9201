//! TCP sink
//!
//! Streams one JSON line per entry to a remote collector. The connection is
//! opened once; when it cannot be opened, or a write fails, entries go to
//! the durable buffer instead.

use super::durable::{replay, DurableBuffer};
use crate::core::{LogSink, Result, SinkMetrics};
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Sink writing newline-terminated JSON over a TCP stream
///
/// # Example
///
/// ```no_run
/// use rust_event_logger::sinks::TcpSink;
///
/// let sink = TcpSink::new("logs.internal", 5170, "/var/log/app/events.log");
/// if !sink.is_connected() {
///     eprintln!("collector unreachable, buffering to file");
/// }
/// ```
#[derive(Debug)]
pub struct TcpSink {
    stream: Option<TcpStream>,
    address: String,
    buffer: DurableBuffer,
}

impl TcpSink {
    /// Connect to `host:port`, falling back to the file at `path`
    pub fn new(host: &str, port: u16, path: impl Into<PathBuf>) -> Self {
        let address = format!("{}:{}", host, port);
        let stream = match connect(&address) {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::warn!(%address, error = %e, "tcp sink unavailable, buffering to file");
                None
            }
        };

        Self {
            stream,
            address,
            buffer: DurableBuffer::new(path),
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.buffer = self.buffer.with_threshold(threshold);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn buffer(&self) -> &DurableBuffer {
        &self.buffer
    }
}

fn connect(address: &str) -> io::Result<TcpStream> {
    let mut last_error = None;

    for addr in address.to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => {
                stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
    }))
}

fn write_line(
    stream: &mut Option<TcpStream>,
    address: &str,
    buffer: &mut DurableBuffer,
    json: &str,
) -> Result<()> {
    if let Some(connection) = stream.as_mut() {
        let mut line = String::with_capacity(json.len() + 1);
        line.push_str(json.trim_end_matches(['\r', '\n']));
        line.push('\n');

        match connection.write_all(line.as_bytes()) {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(%address, error = %e, "tcp write failed, buffering to file");
                *stream = None;
            }
        }
    }

    buffer.send(json)
}

impl LogSink for TcpSink {
    fn send(&mut self, json: &str) -> Result<()> {
        write_line(&mut self.stream, &self.address, &mut self.buffer, json)
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(connection) = self.stream.as_mut() {
            connection.flush()?;
        }
        self.buffer.flush()
    }

    /// Replay the durable file through the connection
    fn resend(&mut self) -> Result<()> {
        let stream = &mut self.stream;
        let address = self.address.as_str();
        replay(&mut self.buffer, |buffer, line| write_line(stream, address, buffer, line)).map(|_| ())
    }

    fn name(&self) -> &str {
        "tcp"
    }

    fn metrics(&self) -> Option<Arc<SinkMetrics>> {
        Some(self.buffer.metrics())
    }
}
