//! Durable buffering shared by every sink
//!
//! Entries are held in memory and appended to a newline-delimited JSON file
//! once the threshold is reached. A drain detaches the file by renaming it,
//! so writers that append afterwards start a fresh file while the old one is
//! replayed.

use crate::core::{LoggerError, Result, SinkMetrics};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Entries kept in memory before they are written out
pub const DEFAULT_BUFFER_SIZE: usize = 50;

const TEMP_SUFFIX: &str = ".tmp";

static DRAIN_SEQ: AtomicU64 = AtomicU64::new(0);

/// In-memory buffer backed by an append-only file
///
/// # Example
///
/// ```no_run
/// use rust_event_logger::sinks::DurableBuffer;
///
/// let mut buffer = DurableBuffer::new("/var/log/app/events.log").with_threshold(10);
/// buffer.send(r#"{"message":"hello"}"#).unwrap();
/// buffer.flush().unwrap();
/// ```
#[derive(Debug)]
pub struct DurableBuffer {
    path: PathBuf,
    entries: Vec<String>,
    threshold: usize,
    metrics: Arc<SinkMetrics>,
}

impl DurableBuffer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::with_capacity(DEFAULT_BUFFER_SIZE),
            threshold: DEFAULT_BUFFER_SIZE,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Set the flush threshold (at least 1)
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold.max(1);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<SinkMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Entries waiting in memory
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metrics(&self) -> Arc<SinkMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Buffer one serialized entry, flushing once the threshold is reached
    pub fn send(&mut self, json: &str) -> Result<()> {
        self.entries.push(json.trim_end_matches(['\r', '\n']).to_string());
        self.metrics.record_buffered();

        if self.entries.len() >= self.threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Append every buffered entry to the file, one per line
    ///
    /// The buffer is cleared only after the write succeeded, so a failed
    /// flush can be retried.
    pub fn flush(&mut self) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }

        let size = self.entries.iter().map(|entry| entry.len() + 1).sum();
        let mut data = String::with_capacity(size);
        for entry in &self.entries {
            data.push_str(entry);
            data.push('\n');
        }

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(data.as_bytes()));

        match written {
            Ok(()) => {
                self.metrics.record_flushed(self.entries.len());
                self.entries.clear();
                Ok(())
            }
            Err(e) => {
                self.metrics.record_flush_failure();
                Err(LoggerError::io_operation(
                    "flushing durable buffer",
                    self.path.display().to_string(),
                    e,
                ))
            }
        }
    }

    /// Rename the durable file away for draining
    ///
    /// Returns `None` when there is no file. Entries still in memory are not
    /// part of the drain; flush first to include them.
    pub fn detach(&mut self) -> Result<Option<Drain>> {
        let temp = self.temp_path()?;

        match fs::rename(&self.path, &temp) {
            Ok(()) => Drain::open(temp).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LoggerError::io_operation(
                "detaching durable file",
                self.path.display().to_string(),
                e,
            )),
        }
    }

    // Same directory as the live file, so the rename never crosses filesystems
    fn temp_path(&self) -> Result<PathBuf> {
        let seq = DRAIN_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut name = self.file_name()?;
        name.push_str(&format!(".{}-{}{}", std::process::id(), seq, TEMP_SUFFIX));
        Ok(self.path.with_file_name(name))
    }

    // Temp and orphan names derive from it; an empty name would match every temp file
    fn file_name(&self) -> Result<String> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                LoggerError::file_sink(self.path.display().to_string(), "path does not name a file")
            })
    }

    /// Temp files left behind by drains that never completed
    pub fn orphans(&self) -> Result<Vec<PathBuf>> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = format!("{}.", self.file_name()?);

        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(LoggerError::io_operation(
                    "listing orphaned drains",
                    dir.display().to_string(),
                    e,
                ))
            }
        };

        let mut orphans: Vec<PathBuf> = listing
            .filter_map(|item| item.ok())
            .map(|item| item.path())
            .filter(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy())
                    .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(TEMP_SUFFIX))
            })
            .collect();
        orphans.sort();
        Ok(orphans)
    }

    /// Append the content of orphaned temp files to the live file
    ///
    /// Must not run while another drain of the same file is in progress.
    /// Returns the number of recovered entries.
    pub fn recover_orphans(&mut self) -> Result<usize> {
        let mut recovered = 0;

        for orphan in self.orphans()? {
            let drain = Drain::open(orphan.clone())?;
            for line in drain {
                self.entries.push(line?);
                self.metrics.record_buffered();
                recovered += 1;
            }
            self.flush()?;
            fs::remove_file(&orphan).map_err(|e| {
                LoggerError::io_operation("removing orphaned drain", orphan.display().to_string(), e)
            })?;
        }

        if recovered > 0 {
            tracing::debug!(path = %self.path.display(), recovered, "recovered orphaned drain entries");
        }
        Ok(recovered)
    }
}

impl Drop for DurableBuffer {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::error!(
                path = %self.path.display(),
                pending = self.entries.len(),
                error = %e,
                "failed to flush durable buffer on drop"
            );
        }
    }
}

/// Detached durable file being replayed
///
/// Yields one entry per non-blank line. The file is removed only by
/// [`Drain::complete`]; dropping a drain leaves it for
/// [`DurableBuffer::recover_orphans`].
#[derive(Debug)]
pub struct Drain {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
}

impl Drain {
    fn open(path: PathBuf) -> Result<Self> {
        let file = File::open(&path)
            .map_err(|e| LoggerError::io_operation("opening drain", path.display().to_string(), e))?;
        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the temp file once every entry has been handed off
    pub fn complete(self) -> Result<()> {
        let Drain { path, lines } = self;
        drop(lines);
        fs::remove_file(&path)
            .map_err(|e| LoggerError::io_operation("removing drained file", path.display().to_string(), e))
    }
}

impl Iterator for Drain {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next()? {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(Ok(line)),
                Err(e) => {
                    return Some(Err(LoggerError::io_operation(
                        "reading drain",
                        self.path.display().to_string(),
                        e,
                    )))
                }
            }
        }
    }
}

/// Drain the durable file through `send`
///
/// Pending entries are flushed first so they take part in the drain. The
/// temp file is deleted only after every replayed entry has been written
/// back out. Returns the number of replayed entries.
pub fn replay<S>(buffer: &mut DurableBuffer, mut send: S) -> Result<usize>
where
    S: FnMut(&mut DurableBuffer, &str) -> Result<()>,
{
    buffer.flush()?;

    let Some(mut drain) = buffer.detach()? else {
        return Ok(0);
    };

    let mut replayed = 0;
    for line in &mut drain {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                buffer.flush()?;
                return Err(e);
            }
        };
        send(buffer, &line)?;
        replayed += 1;
    }

    buffer.metrics.record_replayed(replayed);
    buffer.flush()?;
    tracing::debug!(path = %buffer.path.display(), replayed, "replayed durable file");
    drain.complete()?;
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_flush_at_threshold() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        let mut buffer = DurableBuffer::new(&path).with_threshold(3);

        buffer.send("1").unwrap();
        buffer.send("2").unwrap();
        assert!(!path.exists());

        buffer.send("3").unwrap();
        assert_eq!(lines(&path), vec!["1", "2", "3"]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.metrics().flushed(), 3);
    }

    #[test]
    fn test_flush_empty_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        let mut buffer = DurableBuffer::new(&path);

        buffer.flush().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_flush_keeps_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("events.log");
        let mut buffer = DurableBuffer::new(&path);

        buffer.send("kept").unwrap();
        assert!(buffer.flush().is_err());
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.metrics().flush_failures(), 1);

        fs::create_dir(dir.path().join("missing")).unwrap();
        buffer.flush().unwrap();
        assert_eq!(lines(&path), vec!["kept"]);
    }

    #[test]
    fn test_drop_flushes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        {
            let mut buffer = DurableBuffer::new(&path);
            buffer.send("a").unwrap();
        }
        assert_eq!(lines(&path), vec!["a"]);
    }

    #[test]
    fn test_trailing_newline_not_doubled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        let mut buffer = DurableBuffer::new(&path);

        buffer.send("a\n").unwrap();
        buffer.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
    }

    #[test]
    fn test_path_without_file_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("events.log.1-0.tmp"), "x\n").unwrap();

        let mut buffer = DurableBuffer::new(dir.path().join(".."));
        assert!(matches!(buffer.detach(), Err(LoggerError::FileSink { .. })));
        assert!(matches!(buffer.orphans(), Err(LoggerError::FileSink { .. })));
        assert!(matches!(buffer.recover_orphans(), Err(LoggerError::FileSink { .. })));
        assert!(dir.path().join("events.log.1-0.tmp").exists());
    }

    #[test]
    fn test_detach_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut buffer = DurableBuffer::new(dir.path().join("events.log"));
        assert!(buffer.detach().unwrap().is_none());
    }

    #[test]
    fn test_drain_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        fs::write(&path, "a\n\n  \nb\r\n").unwrap();

        let mut buffer = DurableBuffer::new(&path);
        let drain = buffer.detach().unwrap().unwrap();
        let temp = drain.path().to_path_buf();
        assert!(!path.exists());
        assert!(temp.exists());

        let items: Vec<String> = drain.map(|line| line.unwrap()).collect();
        assert_eq!(items, vec!["a", "b"]);
        // dropping the drain keeps the temp file
        assert!(temp.exists());
    }

    #[test]
    fn test_replay_rewrites_and_removes_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        fs::write(&path, "a\nb\n").unwrap();

        let mut buffer = DurableBuffer::new(&path);
        buffer.send("c").unwrap();

        let replayed = replay(&mut buffer, |buffer, line| buffer.send(line)).unwrap();
        assert_eq!(replayed, 3);
        assert_eq!(lines(&path), vec!["a", "b", "c"]);
        assert!(buffer.orphans().unwrap().is_empty());
    }

    #[test]
    fn test_recover_orphans() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        fs::write(&path, "live\n").unwrap();
        fs::write(dir.path().join("events.log.99-0.tmp"), "x\ny\n").unwrap();
        fs::write(dir.path().join("other.log.1-0.tmp"), "z\n").unwrap();

        let mut buffer = DurableBuffer::new(&path);
        assert_eq!(buffer.orphans().unwrap().len(), 1);
        assert_eq!(buffer.recover_orphans().unwrap(), 2);
        assert_eq!(lines(&path), vec!["live", "x", "y"]);
        assert!(buffer.orphans().unwrap().is_empty());
        assert!(dir.path().join("other.log.1-0.tmp").exists());
    }
}
