//! Main logger implementation

use super::{
    ambient::AmbientContext,
    config::LoggerConfig,
    context::{ContextGuard, ContextStack, ContextValue},
    entry::Entry,
    entry_builder::{DefaultMessageHandler, EntryBuilder, LogArg, MessageHandler},
    error::Result,
    metrics::SinkMetrics,
    severity::Severity,
    sink::LogSink,
    stacktrace::{FrameFilter, LibraryFrameFilter, StackExtractor},
};
use crate::sinks::NullSink;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Builds entries from logging calls and hands them to one sink
///
/// All work happens on the calling thread. Logging calls never fail: a sink
/// error while sending is reported through `tracing` and the entry stays in
/// the sink's durable buffer.
///
/// # Example
///
/// ```
/// use rust_event_logger::prelude::*;
/// use rust_event_logger::info;
///
/// let logger = Logger::builder().sink(NullSink::new()).build();
///
/// logger.persist_context(vec![Index::pair("service", "billing").into()]);
/// info!(logger, "charged %d cents", 1250, Meta::pair("order", 77));
/// ```
pub struct Logger {
    sink: Mutex<Box<dyn LogSink>>,
    context: Arc<RwLock<ContextStack>>,
    builder: EntryBuilder,
}

impl Logger {
    #[must_use]
    pub fn new(sink: impl LogSink + 'static) -> Self {
        Self::builder().sink(sink).build()
    }

    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Logger with the sink described by `config`
    pub fn from_config(config: &LoggerConfig) -> Result<Self> {
        Ok(Self::builder().boxed_sink(config.build_sink()?).build())
    }

    /// Log with the current thread's request context
    pub fn log(&self, severity: Severity, args: Vec<LogArg>) {
        let ambient = AmbientContext::current();
        self.log_with(&ambient, severity, args);
    }

    /// Log with an explicit request context
    pub fn log_with(&self, ambient: &AmbientContext, severity: Severity, args: Vec<LogArg>) {
        let entry = self.build_entry(ambient, severity, args);

        let json = match entry.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize log entry");
                return;
            }
        };

        let mut sink = self.sink.lock();
        if let Err(e) = sink.send(&json) {
            tracing::warn!(sink = sink.name(), error = %e, "log sink failed to buffer entry");
        }
    }

    /// Build an entry without sending it
    pub fn build_entry(&self, ambient: &AmbientContext, severity: Severity, args: Vec<LogArg>) -> Entry {
        let context = self.context.read();
        self.builder.build(severity, args, &context, ambient)
    }

    #[inline]
    pub fn emergency(&self, args: Vec<LogArg>) {
        self.log(Severity::Emergency, args);
    }

    #[inline]
    pub fn alert(&self, args: Vec<LogArg>) {
        self.log(Severity::Alert, args);
    }

    #[inline]
    pub fn critical(&self, args: Vec<LogArg>) {
        self.log(Severity::Critical, args);
    }

    #[inline]
    pub fn error(&self, args: Vec<LogArg>) {
        self.log(Severity::Error, args);
    }

    #[inline]
    pub fn warn(&self, args: Vec<LogArg>) {
        self.log(Severity::Warning, args);
    }

    #[inline]
    pub fn notice(&self, args: Vec<LogArg>) {
        self.log(Severity::Notice, args);
    }

    #[inline]
    pub fn info(&self, args: Vec<LogArg>) {
        self.log(Severity::Informational, args);
    }

    #[inline]
    pub fn debug(&self, args: Vec<LogArg>) {
        self.log(Severity::Debug, args);
    }

    /// Add a transient context layer and return its index
    pub fn set_context(&self, layer: impl IntoIterator<Item = ContextValue>) -> usize {
        self.context.write().set(layer)
    }

    /// Remove the most recent transient layer
    pub fn reset_context(&self) {
        self.context.write().reset();
    }

    /// Remove the transient layer at `index` and every later one
    pub fn reset_context_to(&self, index: usize) {
        self.context.write().reset_to(index);
    }

    /// Remove every transient layer
    pub fn clear_context(&self) {
        self.context.write().clear();
    }

    /// Add a layer that no reset removes
    pub fn persist_context(&self, layer: impl IntoIterator<Item = ContextValue>) {
        self.context.write().persist(layer);
    }

    /// Add a transient layer removed when the guard drops
    ///
    /// # Example
    ///
    /// ```
    /// use rust_event_logger::prelude::*;
    ///
    /// let logger = Logger::new(NullSink::new());
    /// {
    ///     let _request = logger.scoped_context(vec![Index::pair("request_id", "r-19").into()]);
    ///     assert_eq!(logger.context_depth(), 1);
    /// }
    /// assert_eq!(logger.context_depth(), 0);
    /// ```
    pub fn scoped_context(&self, layer: impl IntoIterator<Item = ContextValue>) -> ContextGuard {
        let index = self.context.write().set(layer);
        ContextGuard::new(Arc::clone(&self.context), index)
    }

    /// Number of transient context layers
    pub fn context_depth(&self) -> usize {
        self.context.read().transient_len()
    }

    /// Write buffered entries to the sink's durable storage
    pub fn flush(&self) -> Result<()> {
        self.sink.lock().flush()
    }

    /// Replay previously persisted entries through the sink
    pub fn resend(&self) -> Result<()> {
        self.sink.lock().resend()
    }

    /// Flush everything still buffered
    ///
    /// Storage failures are returned here instead of being lost in `Drop`.
    pub fn shutdown(&self) -> Result<()> {
        self.flush()
    }

    pub fn metrics(&self) -> Option<Arc<SinkMetrics>> {
        self.sink.lock().metrics()
    }

    pub fn sink_name(&self) -> String {
        self.sink.lock().name().to_string()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        let sink = self.sink.get_mut();
        if let Err(e) = sink.flush() {
            tracing::error!(sink = sink.name(), error = %e, "failed to flush log sink during shutdown");
        }
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use rust_event_logger::prelude::*;
/// use std::sync::Arc;
///
/// let logger = Logger::builder()
///     .sink(NullSink::new())
///     .stacktrace_initializer(Arc::new(|frame: &CallFrame| {
///         frame.path.as_deref().is_some_and(|path| path.contains("/src/"))
///     }))
///     .build();
/// assert_eq!(logger.sink_name(), "null");
/// ```
pub struct LoggerBuilder {
    sink: Option<Box<dyn LogSink>>,
    message_handler: Arc<dyn MessageHandler>,
    frame_filter: Arc<dyn FrameFilter>,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            sink: None,
            message_handler: Arc::new(DefaultMessageHandler),
            frame_filter: Arc::new(LibraryFrameFilter),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn boxed_sink(mut self, sink: Box<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Intercept arguments before the built-in handling
    #[must_use = "builder methods return a new value"]
    pub fn message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.message_handler = handler;
        self
    }

    /// Locate the first caller frame of live stacktraces
    #[must_use = "builder methods return a new value"]
    pub fn stacktrace_initializer(mut self, filter: Arc<dyn FrameFilter>) -> Self {
        self.frame_filter = filter;
        self
    }

    /// Build the logger; without a sink, entries are discarded
    pub fn build(self) -> Logger {
        Logger {
            sink: Mutex::new(self.sink.unwrap_or_else(|| Box::new(NullSink::new()))),
            context: Arc::new(RwLock::new(ContextStack::new())),
            builder: EntryBuilder::new(self.message_handler, StackExtractor::new(self.frame_filter)),
        }
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
