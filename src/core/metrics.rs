//! Sink metrics for observability
//!
//! Counters for monitoring durable buffering and delivery: how many entries
//! were buffered, written to disk, replayed by a resend, delivered to a
//! collector or pushed back to the durable file after a failed delivery.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for durable sinks
///
/// # Example
///
/// ```
/// use rust_event_logger::SinkMetrics;
///
/// let metrics = SinkMetrics::new();
///
/// metrics.record_buffered();
/// metrics.record_flushed(1);
///
/// assert_eq!(metrics.buffered(), 1);
/// assert_eq!(metrics.flushed(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Entries accepted into the in-memory buffer
    buffered: AtomicU64,

    /// Entries written to the durable file
    flushed: AtomicU64,

    /// Flush attempts that failed with an I/O error
    flush_failures: AtomicU64,

    /// Entries read back from the durable file by a resend
    replayed: AtomicU64,

    /// Entries confirmed by the remote collector
    delivered: AtomicU64,

    /// Entries pushed back to the durable buffer after a failed delivery
    requeued: AtomicU64,

    /// Batches the collector did not accept
    failed_batches: AtomicU64,
}

impl SinkMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            buffered: AtomicU64::new(0),
            flushed: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
            replayed: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            requeued: AtomicU64::new(0),
            failed_batches: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn buffered(&self) -> u64 {
        self.buffered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn flushed(&self) -> u64 {
        self.flushed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn flush_failures(&self) -> u64 {
        self.flush_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn replayed(&self) -> u64 {
        self.replayed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn requeued(&self) -> u64 {
        self.requeued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed_batches(&self) -> u64 {
        self.failed_batches.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_buffered(&self) -> u64 {
        self.buffered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_flushed(&self, count: usize) -> u64 {
        self.flushed.fetch_add(count as u64, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_flush_failure(&self) -> u64 {
        self.flush_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_replayed(&self, count: usize) -> u64 {
        self.replayed.fetch_add(count as u64, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self, count: usize) -> u64 {
        self.delivered.fetch_add(count as u64, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_requeued(&self, count: usize) -> u64 {
        self.requeued.fetch_add(count as u64, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failed_batch(&self) -> u64 {
        self.failed_batches.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        let metrics = SinkMetrics::new();
        assert_eq!(metrics.buffered(), 0);
        assert_eq!(metrics.flushed(), 0);
        assert_eq!(metrics.delivered(), 0);
        assert_eq!(metrics.failed_batches(), 0);
    }

    #[test]
    fn test_record_returns_previous_value() {
        let metrics = SinkMetrics::new();
        assert_eq!(metrics.record_flushed(3), 0);
        assert_eq!(metrics.record_flushed(2), 3);
        assert_eq!(metrics.flushed(), 5);
    }
}
