//! # Rust Event Logger
//!
//! Structured event logging with durable buffering and recovery.
//!
//! Each logging call becomes one JSON entry: severity, message, request
//! metadata, layered `Index`/`Meta`/`Raw` context and a stacktrace. Entries
//! go to a sink that keeps them in an append-only file until they are
//! delivered, and `resend` drains that file again after a failure.
//!
//! ## Features
//!
//! - **Layered context**: persistent and transient context layers
//! - **printf-style messages**: `info!(logger, "took %.1f ms", 4.25)`
//! - **Durable sinks**: file, TCP, UDP and HTTP collector, all backed by a file
//! - **Crash-safe recovery**: rename-based draining with at-least-once delivery
//!
//! ```no_run
//! use rust_event_logger::prelude::*;
//! use rust_event_logger::warn;
//!
//! let logger = Logger::new(FileSink::new("/var/log/app/events.log"));
//! warn!(logger, "slow query", Meta::pair("ms", 812));
//! logger.resend().unwrap();
//! ```

pub mod core;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        AmbientContext, CallFrame, CapturedError, ContextGuard, ContextMap, ContextStack,
        ContextValue, Entry, FrameFilter, Index, LogArg, LogSink, Logger, LoggerBuilder,
        LoggerConfig, LoggerError, MessageHandler, Meta, Raw, Result, Severity, SinkMetrics,
    };
    pub use crate::sinks::{Credentials, FileSink, HttpSink, NullSink, TcpSink, UdpSink};
}

pub use core::{
    AmbientContext, CallFrame, CapturedError, ContextGuard, ContextMap, ContextStack, ContextValue,
    DeliveryError, DeliveryResult, Entry, EntryBuilder, Frame, FrameFilter, Index, LibraryFrameFilter,
    LogArg, LogSink, Logger, LoggerBuilder, LoggerConfig, LoggerError, MessageHandler, Meta, Raw,
    RequestScope, Result, Scalar, Severity, SinkKind, SinkMetrics, StackExtractor,
};
pub use sinks::{Credentials, DurableBuffer, FileSink, HttpSink, HttpTransport, NullSink, TcpSink, UdpSink};
