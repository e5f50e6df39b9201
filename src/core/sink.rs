//! Sink trait for log destinations

use super::{error::Result, metrics::SinkMetrics};
use std::sync::Arc;

/// Destination for serialized entries
///
/// `send` must not lose an accepted entry: sinks that cannot deliver it
/// right away keep it in a durable buffer. `resend` drains whatever was
/// persisted earlier and retries delivery.
pub trait LogSink: Send {
    fn send(&mut self, json: &str) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn resend(&mut self) -> Result<()>;
    fn name(&self) -> &str;

    fn metrics(&self) -> Option<Arc<SinkMetrics>> {
        None
    }
}

impl LogSink for Box<dyn LogSink> {
    fn send(&mut self, json: &str) -> Result<()> {
        (**self).send(json)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn resend(&mut self) -> Result<()> {
        (**self).resend()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn metrics(&self) -> Option<Arc<SinkMetrics>> {
        (**self).metrics()
    }
}
