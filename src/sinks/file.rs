//! Durable file sink

use super::durable::{replay, DurableBuffer};
use crate::core::{LogSink, Result, SinkMetrics};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Buffers entries into a newline-delimited JSON file
///
/// # Example
///
/// ```no_run
/// use rust_event_logger::prelude::*;
///
/// let logger = Logger::builder()
///     .sink(FileSink::new("/var/log/app/events.log"))
///     .build();
///
/// logger.info(vec!["service started".into()]);
/// ```
#[derive(Debug)]
pub struct FileSink {
    buffer: DurableBuffer,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            buffer: DurableBuffer::new(path),
        }
    }

    /// Set the number of entries buffered before a write
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.buffer = self.buffer.with_threshold(threshold);
        self
    }

    pub fn path(&self) -> &Path {
        self.buffer.path()
    }

    pub fn buffer(&self) -> &DurableBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut DurableBuffer {
        &mut self.buffer
    }
}

impl LogSink for FileSink {
    fn send(&mut self, json: &str) -> Result<()> {
        self.buffer.send(json)
    }

    fn flush(&mut self) -> Result<()> {
        self.buffer.flush()
    }

    /// Re-append the drained entries to a fresh durable file
    fn resend(&mut self) -> Result<()> {
        replay(&mut self.buffer, |buffer, line| buffer.send(line)).map(|_| ())
    }

    fn name(&self) -> &str {
        "file"
    }

    fn metrics(&self) -> Option<Arc<SinkMetrics>> {
        Some(self.buffer.metrics())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_sink_writes_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut sink = FileSink::new(&path).with_threshold(2);

        sink.send(r#"{"n":1}"#).unwrap();
        sink.send(r#"{"n":2}"#).unwrap();
        sink.send(r#"{"n":3}"#).unwrap();
        sink.flush().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\"n\":1}\n{\"n\":2}\n{\"n\":3}\n");
        assert_eq!(sink.name(), "file");
    }

    #[test]
    fn test_resend_keeps_every_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut sink = FileSink::new(&path);

        for n in 0..5 {
            sink.send(&format!(r#"{{"n":{}}}"#, n)).unwrap();
        }
        sink.resend().unwrap();
        sink.resend().unwrap();

        let count = fs::read_to_string(&path).unwrap().lines().count();
        assert_eq!(count, 5);
        assert_eq!(sink.metrics().unwrap().replayed(), 10);
    }

    #[test]
    fn test_resend_without_file() {
        let dir = TempDir::new().unwrap();
        let mut sink = FileSink::new(dir.path().join("none.log"));
        sink.resend().unwrap();
        assert!(!sink.path().exists());
    }
}
