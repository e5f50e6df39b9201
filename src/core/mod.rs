//! Core logger types and traits

pub mod ambient;
pub mod config;
pub mod context;
pub mod entry;
pub mod entry_builder;
pub mod error;
pub mod format;
pub mod logger;
pub mod metrics;
pub mod severity;
pub mod sink;
pub mod stacktrace;

pub use ambient::{AmbientContext, RequestScope};
pub use config::{LoggerConfig, SinkKind, ENV_PREFIX};
pub use context::{ContextGuard, ContextLayer, ContextMap, ContextStack, ContextValue, Index, Meta, Raw};
pub use entry::{Entry, APP_TAG, FACILITY, NO_MESSAGE};
pub use entry_builder::{assemble_message, DefaultMessageHandler, EntryBuilder, LogArg, MessageHandler};
pub use error::{DeliveryError, DeliveryResult, LoggerError, Result};
pub use format::{sprintf, Scalar};
pub use logger::{Logger, LoggerBuilder};
pub use metrics::SinkMetrics;
pub use severity::Severity;
pub use sink::LogSink;
pub use stacktrace::{
    parse_backtrace_text, CallFrame, CapturedError, Frame, FrameFilter, LibraryFrameFilter, Origin,
    StackExtractor,
};
