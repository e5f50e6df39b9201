//! Recovery and resend tests
//!
//! These tests verify:
//! - Draining never reads entries appended after the rename
//! - HTTP delivery failures re-queue the failed batch and everything unread
//! - Orphaned temp files from a crashed drain are recovered
//! - The reqwest transport against a local collector stub

use parking_lot::Mutex;
use rust_event_logger::prelude::*;
use rust_event_logger::sinks::{BatchRequest, DurableBuffer, HttpTransport};
use rust_event_logger::DeliveryError;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|text| text.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Collector that fails the listed calls and records accepted bodies
#[derive(Clone, Default)]
struct FlakyCollector {
    accepted: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<usize>>,
    fail_calls: Arc<Mutex<HashSet<usize>>>,
}

impl FlakyCollector {
    fn failing_on(calls: &[usize]) -> Self {
        let collector = Self::default();
        collector.fail_calls.lock().extend(calls.iter().copied());
        collector
    }

    fn heal(&self) {
        self.fail_calls.lock().clear();
    }

    fn delivered_entries(&self) -> Vec<String> {
        self.accepted
            .lock()
            .iter()
            .flat_map(|body| body.split('\n').map(str::to_string).collect::<Vec<_>>())
            .collect()
    }
}

impl HttpTransport for FlakyCollector {
    fn post(&self, request: &BatchRequest<'_>) -> std::result::Result<u16, DeliveryError> {
        let mut calls = self.calls.lock();
        let call = *calls;
        *calls += 1;

        if self.fail_calls.lock().contains(&call) {
            return Err(DeliveryError::Transport("connection reset by peer".to_string()));
        }
        assert_eq!(request.credentials.client_id, "client");
        self.accepted.lock().push(request.body.to_string());
        Ok(200)
    }
}

#[test]
fn test_drain_ignores_writes_after_rename() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shared.log");

    let mut writer = DurableBuffer::new(&path).with_threshold(1);
    for n in 0..5 {
        writer.send(&format!("old-{}", n)).unwrap();
    }

    let mut drainer = DurableBuffer::new(&path);
    let drain = drainer.detach().unwrap().expect("file exists");

    // A second writer appends after the rename point
    for n in 0..3 {
        writer.send(&format!("new-{}", n)).unwrap();
    }

    let drained: Vec<String> = drain.map(|line| line.unwrap()).collect();
    assert_eq!(drained, vec!["old-0", "old-1", "old-2", "old-3", "old-4"]);
    assert_eq!(read_lines(&path), vec!["new-0", "new-1", "new-2"]);

    // The late entries are picked up by the next drain
    let next: Vec<String> = drainer
        .detach()
        .unwrap()
        .expect("new file exists")
        .map(|line| line.unwrap())
        .collect();
    assert_eq!(next, vec!["new-0", "new-1", "new-2"]);
}

#[test]
fn test_file_resend_replays_every_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.log");
    fs::write(&path, "a\nb\n\nc\n").unwrap();

    let logger = Logger::new(FileSink::new(&path));
    logger.resend().unwrap();

    assert_eq!(read_lines(&path), vec!["a", "b", "c"]);
    assert_eq!(logger.metrics().unwrap().replayed(), 3);
}

#[test]
fn test_http_failure_requeues_and_recovers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("outbox.log");
    let entries: Vec<String> = (0..25).map(|n| format!(r#"{{"n":{}}}"#, n)).collect();

    let collector = FlakyCollector::failing_on(&[1]);
    let mut sink = HttpSink::with_transport(&path, Credentials::new("client", "secret"), collector.clone())
        .with_batch_size(10)
        .with_threshold(4);

    for entry in &entries {
        sink.send(entry).unwrap();
    }

    // Batch 0 is delivered, batch 1 fails: entries 10..25 go back to the file
    sink.resend().unwrap();
    assert_eq!(collector.delivered_entries(), entries[..10].to_vec());
    assert_eq!(read_lines(&path), entries[10..].to_vec());
    assert!(sink.buffer().orphans().unwrap().is_empty());

    collector.heal();
    sink.resend().unwrap();

    assert_eq!(collector.delivered_entries(), entries);
    assert!(read_lines(&path).is_empty());

    let metrics = sink.metrics().unwrap();
    assert_eq!(metrics.delivered(), 25);
    assert_eq!(metrics.requeued(), 15);
    assert_eq!(metrics.failed_batches(), 1);
}

#[test]
fn test_http_failure_on_final_partial_batch() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("outbox.log");

    let collector = FlakyCollector::failing_on(&[2]);
    let mut sink = HttpSink::with_transport(&path, Credentials::new("client", "secret"), collector.clone())
        .with_batch_size(2);

    for n in 0..5 {
        sink.send(&n.to_string()).unwrap();
    }
    sink.resend().unwrap();

    assert_eq!(collector.delivered_entries(), vec!["0", "1", "2", "3"]);
    assert_eq!(read_lines(&path), vec!["4"]);
}

#[test]
fn test_entries_sent_during_failed_resend_are_kept() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("outbox.log");

    let collector = FlakyCollector::failing_on(&[0]);
    let logger = Logger::new(
        HttpSink::with_transport(&path, Credentials::new("client", "secret"), collector.clone()),
    );

    logger.info(vec!["before".into(), Raw::pair("stacktrace", serde_json::Value::Null).into()]);
    logger.resend().unwrap();
    logger.info(vec!["after".into(), Raw::pair("stacktrace", serde_json::Value::Null).into()]);
    logger.shutdown().unwrap();

    let messages: Vec<String> = read_lines(&path)
        .iter()
        .map(|line| {
            let entry: serde_json::Value = serde_json::from_str(line).unwrap();
            entry["message"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(messages, vec!["before", "after"]);
}

#[test]
fn test_recover_orphans_after_crashed_drain() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.log");
    fs::write(&path, "a\nb\n").unwrap();

    {
        let mut crashed = DurableBuffer::new(&path);
        let drain = crashed.detach().unwrap().expect("file exists");
        // Dropped without completing, as if the process died mid-drain
        drop(drain);
    }
    assert!(!path.exists());

    let mut buffer = DurableBuffer::new(&path);
    buffer.send("c").unwrap();
    buffer.flush().unwrap();

    assert_eq!(buffer.recover_orphans().unwrap(), 2);
    assert_eq!(read_lines(&path), vec!["c", "a", "b"]);
    assert!(buffer.orphans().unwrap().is_empty());
}

#[cfg(feature = "http")]
mod reqwest_transport {
    use super::*;
    use rust_event_logger::sinks::ReqwestTransport;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    /// Accept one request, return its head and body, answer with `status`
    fn serve_once(listener: TcpListener, status: u16) -> thread::JoinHandle<(String, String)> {
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut head = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
                head.push_str(&line);
            }

            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();

            let mut stream = stream;
            let response = format!("HTTP/1.1 {} X\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status);
            stream.write_all(response.as_bytes()).unwrap();

            (head, String::from_utf8(body).unwrap())
        })
    }

    #[test]
    fn test_posts_json_seq_with_basic_auth() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/api/v1/logs", listener.local_addr().unwrap());
        let server = serve_once(listener, 200);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("outbox.log");
        let transport = ReqwestTransport::new(Duration::from_secs(10)).unwrap();
        let mut sink = HttpSink::with_transport(&path, Credentials::new("client", "s3cret"), transport)
            .with_endpoint(endpoint);

        sink.send(r#"{"n":1}"#).unwrap();
        sink.send(r#"{"n":2}"#).unwrap();
        sink.resend().unwrap();

        let (head, body) = server.join().unwrap();
        // base64("client:s3cret")
        assert!(head.contains("Basic Y2xpZW50OnMzY3JldA=="));
        let head = head.to_ascii_lowercase();
        assert!(head.starts_with("post /api/v1/logs"));
        assert!(head.contains("content-type: application/json-seq"));
        assert_eq!(body, "{\"n\":1}\n{\"n\":2}");
        assert!(!path.exists());
        assert_eq!(sink.metrics().unwrap().delivered(), 2);
    }

    #[test]
    fn test_non_200_keeps_entries() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/logs", listener.local_addr().unwrap());
        let server = serve_once(listener, 500);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("outbox.log");
        let transport = ReqwestTransport::new(Duration::from_secs(10)).unwrap();
        let mut sink = HttpSink::with_transport(&path, Credentials::new("client", "s3cret"), transport)
            .with_endpoint(endpoint);

        sink.send("kept").unwrap();
        sink.resend().unwrap();
        server.join().unwrap();

        assert_eq!(read_lines(&path), vec!["kept"]);
        assert_eq!(sink.metrics().unwrap().failed_batches(), 1);
    }
}
