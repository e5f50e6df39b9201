//! Stacktrace extraction
//!
//! Frames come from two places: a [`CapturedError`] passed as a log
//! argument, or the live call stack at the logging call. Live frames are
//! filtered so that the logging library itself never shows up.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::path::Path;
use std::sync::Arc;

const LIBRARY_SRC: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src");
const CRATE_PREFIX: &str = concat!(env!("CARGO_CRATE_NAME"), "::");

// Capture and closure-call plumbing between the logging call and its caller
const MACHINERY_PREFIXES: [&str; 4] = ["backtrace::", "std::", "core::", "alloc::"];

/// One serialized stacktrace frame, innermost first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Frame {
    pub fn at(path: impl Into<String>, line: u32) -> Self {
        Self {
            path: Some(path.into()),
            line: Some(line),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_callee(mut self, callee: impl Into<String>) -> Self {
        self.callee = Some(callee.into());
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A resolved frame of the live call stack, before filtering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallFrame {
    pub path: Option<String>,
    pub line: Option<u32>,
    /// Demangled name of the function executing in this frame
    pub symbol: Option<String>,
}

/// Locates the first frame that belongs to the caller
///
/// Frames are skipped until `is_caller` first returns true; every frame from
/// there outward is kept.
pub trait FrameFilter: Send + Sync {
    fn is_caller(&self, frame: &CallFrame) -> bool;
}

impl<F> FrameFilter for F
where
    F: Fn(&CallFrame) -> bool + Send + Sync,
{
    fn is_caller(&self, frame: &CallFrame) -> bool {
        self(frame)
    }
}

/// Skips stack-capture machinery and this library's own frames
///
/// Standard library frames are machinery too until the first caller frame
/// is found; after that every frame is kept.
///
/// Frames without a source path never count as the caller. Binaries built
/// without debug info resolve no paths, so their live stacktraces are
/// always `[]`; enable `debug = "line-tables-only"` (or more) in the build
/// profile, or install a custom filter through
/// [`LoggerBuilder::stacktrace_initializer`](crate::LoggerBuilder::stacktrace_initializer).
#[derive(Debug, Clone, Copy, Default)]
pub struct LibraryFrameFilter;

impl LibraryFrameFilter {
    pub fn is_library_path(path: &str) -> bool {
        Path::new(path).starts_with(LIBRARY_SRC)
    }

    fn is_internal_symbol(symbol: &str) -> bool {
        let symbol = symbol.trim_start_matches('<');
        symbol.starts_with(CRATE_PREFIX)
            || MACHINERY_PREFIXES.iter().any(|prefix| symbol.starts_with(prefix))
    }
}

impl FrameFilter for LibraryFrameFilter {
    fn is_caller(&self, frame: &CallFrame) -> bool {
        if frame.symbol.as_deref().is_some_and(Self::is_internal_symbol) {
            return false;
        }
        match frame.path.as_deref() {
            Some(path) => !Self::is_library_path(path),
            None => false,
        }
    }
}

/// Turns call stacks into serialized frames
#[derive(Clone)]
pub struct StackExtractor {
    filter: Arc<dyn FrameFilter>,
}

impl Default for StackExtractor {
    fn default() -> Self {
        Self::new(Arc::new(LibraryFrameFilter))
    }
}

impl fmt::Debug for StackExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackExtractor").finish_non_exhaustive()
    }
}

impl StackExtractor {
    pub fn new(filter: Arc<dyn FrameFilter>) -> Self {
        Self { filter }
    }

    /// Capture and filter the live call stack
    pub fn capture(&self) -> Vec<Frame> {
        self.filter_frames(&live_call_frames())
    }

    /// Apply the skip filter to already resolved frames
    ///
    /// `callee` of a kept frame is the function called from that location,
    /// i.e. the symbol of the next inner frame.
    pub fn filter_frames(&self, frames: &[CallFrame]) -> Vec<Frame> {
        let Some(start) = frames.iter().position(|frame| self.filter.is_caller(frame)) else {
            return Vec::new();
        };

        frames[start..]
            .iter()
            .enumerate()
            .map(|(offset, frame)| {
                let index = start + offset;
                let callee = index
                    .checked_sub(1)
                    .and_then(|inner| frames[inner].symbol.clone());
                Frame {
                    path: frame.path.clone(),
                    line: frame.line,
                    callee,
                    note: None,
                }
            })
            .collect()
    }

    /// Frames for an error argument
    ///
    /// The first frame is the error's origin with its message as note. When
    /// the error has a cause, the cause's frames follow and the error's own
    /// call stack is dropped; only the innermost cause contributes its stack.
    pub fn from_error(error: &CapturedError) -> Vec<Frame> {
        let mut frames = vec![Frame {
            path: error.origin.as_ref().map(|origin| origin.path.clone()),
            line: error.origin.as_ref().map(|origin| origin.line),
            callee: None,
            note: Some(error.message.clone()),
        }];

        match error.cause.as_deref() {
            Some(cause) => frames.extend(Self::from_error(cause)),
            None => frames.extend(error.frames.iter().cloned()),
        }

        frames
    }
}

fn live_call_frames() -> Vec<CallFrame> {
    let trace = backtrace::Backtrace::new();

    trace
        .frames()
        .iter()
        .flat_map(|frame| frame.symbols())
        .map(|symbol| CallFrame {
            path: symbol.filename().map(|path| path.display().to_string()),
            line: symbol.lineno(),
            symbol: symbol.name().map(|name| format!("{:#}", name)),
        })
        .collect()
}

/// Source position an error was raised at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub path: String,
    pub line: u32,
}

/// Error argument for logging calls
///
/// Records where it was created and the caller's stack at that point, and
/// may wrap a cause.
///
/// ```
/// use rust_event_logger::CapturedError;
///
/// let cause = CapturedError::at("connection reset", "src/db.rs", 88);
/// let error = CapturedError::new("order lookup failed").caused_by(cause);
///
/// assert_eq!(error.to_string(), "order lookup failed");
/// assert_eq!(error.cause().unwrap().message(), "connection reset");
/// ```
#[derive(Debug, Clone)]
pub struct CapturedError {
    message: String,
    origin: Option<Origin>,
    frames: Vec<Frame>,
    cause: Option<Box<CapturedError>>,
}

impl CapturedError {
    /// Create at the caller's location, capturing the caller's stack
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            message: message.into(),
            origin: Some(Origin {
                path: location.file().to_string(),
                line: location.line(),
            }),
            frames: StackExtractor::default().capture(),
            cause: None,
        }
    }

    /// Create with an explicit origin and no call stack
    pub fn at(message: impl Into<String>, path: impl Into<String>, line: u32) -> Self {
        Self {
            message: message.into(),
            origin: Some(Origin {
                path: path.into(),
                line,
            }),
            frames: Vec::new(),
            cause: None,
        }
    }

    /// Capture any error at the caller's location
    ///
    /// The `source()` chain becomes the cause chain. Causes have no origin,
    /// since plain errors do not record one.
    #[track_caller]
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut captured = Self::new(error.to_string());
        captured.cause = error.source().map(|source| Box::new(Self::from_source(source)));
        captured
    }

    fn from_source(error: &(dyn StdError + 'static)) -> Self {
        Self {
            message: error.to_string(),
            origin: None,
            frames: Vec::new(),
            cause: error.source().map(|source| Box::new(Self::from_source(source))),
        }
    }

    #[must_use]
    pub fn caused_by(mut self, cause: CapturedError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Replace the recorded call stack
    #[must_use]
    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = frames;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn cause(&self) -> Option<&CapturedError> {
        self.cause.as_deref()
    }

    pub fn stacktrace(&self) -> Vec<Frame> {
        StackExtractor::from_error(self)
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for CapturedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Parse the text of a rendered `std::backtrace::Backtrace`
///
/// Each `N: symbol` line opens a frame, with the symbol as callee; a
/// following `at path:line:column` line supplies its location.
///
/// ```
/// use rust_event_logger::core::stacktrace::parse_backtrace_text;
///
/// let text = "   0: app::checkout\n             at ./src/checkout.rs:42:9\n   1: main\n";
/// let frames = parse_backtrace_text(text);
/// assert_eq!(frames.len(), 2);
/// assert_eq!(frames[0].path.as_deref(), Some("./src/checkout.rs"));
/// assert_eq!(frames[0].line, Some(42));
/// assert_eq!(frames[1].callee.as_deref(), Some("main"));
/// ```
pub fn parse_backtrace_text(text: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();

    for line in text.lines().map(str::trim) {
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                let (path, line) = split_location(location);
                frame.path = Some(path.to_string());
                frame.line = line;
            }
            continue;
        }

        if let Some((index, symbol)) = line.split_once(": ") {
            if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                frames.push(Frame {
                    callee: Some(symbol.trim().to_string()),
                    ..Frame::default()
                });
            }
        }
    }

    frames
}

// path:line:column, where path may itself contain ':'
fn split_location(location: &str) -> (&str, Option<u32>) {
    let mut parts = location.rsplitn(3, ':');
    let column = parts.next();
    let line = parts.next();
    match (parts.next(), line, column) {
        (Some(path), Some(line), Some(_)) if line.parse::<u32>().is_ok() => {
            (path, line.parse().ok())
        }
        _ => match location.rsplit_once(':') {
            Some((path, line)) if line.parse::<u32>().is_ok() => (path, line.parse().ok()),
            _ => (location, None),
        },
    }
}
