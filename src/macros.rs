//! Logging macros taking any mix of message parts and context values.
//!
//! Every argument is converted with [`LogArg::from`](crate::LogArg), so
//! strings, numbers, `Index`/`Meta`/`Raw` values and `CapturedError`s can be
//! passed side by side. Several message parts are treated as a printf-style
//! format string followed by its arguments.
//!
//! # Examples
//!
//! ```
//! use rust_event_logger::prelude::*;
//! use rust_event_logger::{error, info};
//!
//! let logger = Logger::new(NullSink::new());
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // printf-style formatting
//! info!(logger, "listening on port %d", 8080);
//!
//! // Structured context next to the message
//! error!(
//!     logger,
//!     "payment failed",
//!     Index::pair("order", "A-1009"),
//!     CapturedError::new("card declined"),
//! );
//! ```

/// Log at an explicit severity.
///
/// # Examples
///
/// ```
/// # use rust_event_logger::prelude::*;
/// # let logger = Logger::new(NullSink::new());
/// use rust_event_logger::log;
/// log!(logger, Severity::Notice, "Simple message");
/// log!(logger, Severity::Error, "Error code: %d", 500);
/// log!(logger, Severity::Debug);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $severity:expr $(, $arg:expr)* $(,)?) => {
        $logger.log($severity, ::std::vec![$($crate::LogArg::from($arg)),*])
    };
}

/// Log an emergency-level event.
///
/// # Examples
///
/// ```
/// # use rust_event_logger::prelude::*;
/// # let logger = Logger::new(NullSink::new());
/// use rust_event_logger::emergency;
/// emergency!(logger, "Database cluster unreachable");
/// ```
#[macro_export]
macro_rules! emergency {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Emergency $(, $arg)*)
    };
}

/// Log an alert-level event.
#[macro_export]
macro_rules! alert {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Alert $(, $arg)*)
    };
}

/// Log a critical-level event.
///
/// # Examples
///
/// ```
/// # use rust_event_logger::prelude::*;
/// # let logger = Logger::new(NullSink::new());
/// use rust_event_logger::critical;
/// critical!(logger, "Disk usage at %d%%", 97);
/// ```
#[macro_export]
macro_rules! critical {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Critical $(, $arg)*)
    };
}

/// Log an error-level event.
///
/// # Examples
///
/// ```
/// # use rust_event_logger::prelude::*;
/// # let logger = Logger::new(NullSink::new());
/// use rust_event_logger::error;
/// let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
/// error!(logger, "Upstream failed", LogArg::error(&io));
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Error $(, $arg)*)
    };
}

/// Log a warning-level event.
///
/// # Examples
///
/// ```
/// # use rust_event_logger::prelude::*;
/// # let logger = Logger::new(NullSink::new());
/// use rust_event_logger::warn;
/// warn!(logger, "Retrying request", Meta::pair("attempt", 3));
/// ```
#[macro_export]
macro_rules! warn {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Warning $(, $arg)*)
    };
}

/// Log a notice-level event.
#[macro_export]
macro_rules! notice {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Notice $(, $arg)*)
    };
}

/// Log an informational event.
///
/// # Examples
///
/// ```
/// # use rust_event_logger::prelude::*;
/// # let logger = Logger::new(NullSink::new());
/// use rust_event_logger::info;
/// info!(logger, "User %s logged in", "alice", Index::pair("user", "alice"));
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Informational $(, $arg)*)
    };
}

/// Log a debug-level event.
///
/// # Examples
///
/// ```
/// # use rust_event_logger::prelude::*;
/// # let logger = Logger::new(NullSink::new());
/// use rust_event_logger::debug;
/// debug!(logger, "Cache state", LogArg::debug(&vec![1, 2, 3]));
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::Severity::Debug $(, $arg)*)
    };
}
