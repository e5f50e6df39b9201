//! UDP sink

use super::durable::{replay, DurableBuffer};
use crate::core::{LogSink, Result, SinkMetrics};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::PathBuf;
use std::sync::Arc;

/// Sends one datagram per entry
///
/// Without a usable socket or target address, entries are buffered to the
/// durable file. A failed datagram is buffered as well.
#[derive(Debug)]
pub struct UdpSink {
    socket: Option<UdpSocket>,
    target: Option<SocketAddr>,
    buffer: DurableBuffer,
}

impl UdpSink {
    pub fn new(host: &str, port: u16, path: impl Into<PathBuf>) -> Self {
        let address = format!("{}:{}", host, port);
        let (socket, target) = match open(&address) {
            Ok((socket, target)) => (Some(socket), Some(target)),
            Err(e) => {
                tracing::warn!(%address, error = %e, "udp sink unavailable, buffering to file");
                (None, None)
            }
        };

        Self {
            socket,
            target,
            buffer: DurableBuffer::new(path),
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.buffer = self.buffer.with_threshold(threshold);
        self
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    pub fn target(&self) -> Option<SocketAddr> {
        self.target
    }
}

fn open(address: &str) -> io::Result<(UdpSocket, SocketAddr)> {
    let target = address.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
    })?;
    let bind = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind)?;
    Ok((socket, target))
}

fn send_datagram(
    socket: Option<&UdpSocket>,
    target: Option<SocketAddr>,
    buffer: &mut DurableBuffer,
    json: &str,
) -> Result<()> {
    if let (Some(socket), Some(target)) = (socket, target) {
        match socket.send_to(json.as_bytes(), target) {
            Ok(_) => return Ok(()),
            Err(e) => tracing::warn!(%target, error = %e, "udp send failed, buffering to file"),
        }
    }

    buffer.send(json)
}

impl LogSink for UdpSink {
    fn send(&mut self, json: &str) -> Result<()> {
        send_datagram(self.socket.as_ref(), self.target, &mut self.buffer, json)
    }

    fn flush(&mut self) -> Result<()> {
        self.buffer.flush()
    }

    fn resend(&mut self) -> Result<()> {
        let socket = self.socket.as_ref();
        let target = self.target;
        replay(&mut self.buffer, |buffer, line| send_datagram(socket, target, buffer, line)).map(|_| ())
    }

    fn name(&self) -> &str {
        "udp"
    }

    fn metrics(&self) -> Option<Arc<SinkMetrics>> {
        Some(self.buffer.metrics())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_sends_datagram_per_entry() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let port = receiver.local_addr().unwrap().port();

        let dir = TempDir::new().unwrap();
        let mut sink = UdpSink::new("127.0.0.1", port, dir.path().join("udp.log"));
        assert!(sink.is_open());
        sink.send(r#"{"message":"ping"}"#).unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], br#"{"message":"ping"}"#);
    }

    #[test]
    fn test_unresolvable_host_buffers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("udp.log");
        let mut sink = UdpSink::new("host.invalid", 514, &path);
        assert!(!sink.is_open());

        sink.send("a").unwrap();
        sink.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
    }
}
