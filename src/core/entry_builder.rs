//! Entry assembly
//!
//! Turns a severity, the argument list of a logging call, the layered
//! context and the ambient request metadata into one [`Entry`].

use super::ambient::AmbientContext;
use super::context::{ContextStack, ContextValue, Index, Meta, Raw};
use super::entry::{Entry, MESSAGE, NO_MESSAGE, STACKTRACE};
use super::format::{sprintf, Scalar};
use super::severity::Severity;
use super::stacktrace::{CapturedError, Frame, FrameFilter, StackExtractor};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// One argument of a logging call
#[derive(Debug, Clone)]
pub enum LogArg {
    /// Contributes its message and its stacktrace
    Error(CapturedError),
    Index(Index),
    Meta(Meta),
    Raw(Raw),
    /// Message part, possibly a format string or a format argument
    Scalar(Scalar),
    /// Printed representation of anything else
    Other(String),
}

impl LogArg {
    /// Capture a borrowed error at the caller's location
    #[track_caller]
    pub fn error(error: &(dyn StdError + 'static)) -> Self {
        LogArg::Error(CapturedError::from_error(error))
    }

    /// Debug-printed representation of an arbitrary value
    pub fn debug<T: fmt::Debug + ?Sized>(value: &T) -> Self {
        LogArg::Other(format!("{:?}", value))
    }
}

impl From<CapturedError> for LogArg {
    fn from(error: CapturedError) -> Self {
        LogArg::Error(error)
    }
}

impl From<Index> for LogArg {
    fn from(index: Index) -> Self {
        LogArg::Index(index)
    }
}

impl From<Meta> for LogArg {
    fn from(meta: Meta) -> Self {
        LogArg::Meta(meta)
    }
}

impl From<Raw> for LogArg {
    fn from(raw: Raw) -> Self {
        LogArg::Raw(raw)
    }
}

impl From<ContextValue> for LogArg {
    fn from(value: ContextValue) -> Self {
        match value {
            ContextValue::Index(index) => LogArg::Index(index),
            ContextValue::Meta(meta) => LogArg::Meta(meta),
            ContextValue::Raw(raw) => LogArg::Raw(raw),
        }
    }
}

impl From<Scalar> for LogArg {
    fn from(scalar: Scalar) -> Self {
        LogArg::Scalar(scalar)
    }
}

impl From<&str> for LogArg {
    fn from(text: &str) -> Self {
        LogArg::Scalar(Scalar::from(text))
    }
}

impl From<String> for LogArg {
    fn from(text: String) -> Self {
        LogArg::Scalar(Scalar::from(text))
    }
}

impl From<&String> for LogArg {
    fn from(text: &String) -> Self {
        LogArg::Scalar(Scalar::from(text.as_str()))
    }
}

// Booleans are not message scalars; they print like any other value
impl From<bool> for LogArg {
    fn from(flag: bool) -> Self {
        LogArg::Other(flag.to_string())
    }
}

impl From<Value> for LogArg {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => LogArg::Scalar(Scalar::Str(text)),
            Value::Number(number) => LogArg::Scalar(Scalar::from_number(&number)),
            other => LogArg::Other(other.to_string()),
        }
    }
}

macro_rules! log_arg_from_number {
    ($($ty:ty),*) => {$(
        impl From<$ty> for LogArg {
            fn from(value: $ty) -> Self {
                LogArg::Scalar(Scalar::from(value))
            }
        }
    )*};
}

log_arg_from_number!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// Intercepts arguments before the built-in dispatch
///
/// Returning `true` marks the argument as handled; the handler may push
/// message parts or edit the entry directly, including its `stacktrace`.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, arg: &LogArg, parts: &mut Vec<Scalar>, entry: &mut Entry) -> bool;
}

impl<F> MessageHandler for F
where
    F: Fn(&LogArg, &mut Vec<Scalar>, &mut Entry) -> bool + Send + Sync,
{
    fn handle(&self, arg: &LogArg, parts: &mut Vec<Scalar>, entry: &mut Entry) -> bool {
        self(arg, parts, entry)
    }
}

/// Handles nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMessageHandler;

impl MessageHandler for DefaultMessageHandler {
    fn handle(&self, _arg: &LogArg, _parts: &mut Vec<Scalar>, _entry: &mut Entry) -> bool {
        false
    }
}

/// Builds entries for one logger
///
/// Tracks the time of the previous entry to fill `duration`.
pub struct EntryBuilder {
    message_handler: Arc<dyn MessageHandler>,
    extractor: StackExtractor,
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
}

impl Default for EntryBuilder {
    fn default() -> Self {
        Self::new(Arc::new(DefaultMessageHandler), StackExtractor::default())
    }
}

impl fmt::Debug for EntryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryBuilder")
            .field("extractor", &self.extractor)
            .field("last_timestamp", &*self.last_timestamp.lock())
            .finish_non_exhaustive()
    }
}

impl EntryBuilder {
    pub fn new(message_handler: Arc<dyn MessageHandler>, extractor: StackExtractor) -> Self {
        Self {
            message_handler,
            extractor,
            last_timestamp: Mutex::new(None),
        }
    }

    pub fn with_frame_filter(filter: Arc<dyn FrameFilter>) -> Self {
        Self::new(Arc::new(DefaultMessageHandler), StackExtractor::new(filter))
    }

    pub fn build(
        &self,
        severity: Severity,
        args: Vec<LogArg>,
        context: &ContextStack,
        ambient: &AmbientContext,
    ) -> Entry {
        self.build_at(Utc::now(), severity, args, context, ambient)
    }

    /// Build with an explicit clock reading
    pub fn build_at(
        &self,
        now: DateTime<Utc>,
        severity: Severity,
        args: Vec<LogArg>,
        context: &ContextStack,
        ambient: &AmbientContext,
    ) -> Entry {
        let mut entry = Entry::new(severity, now.timestamp_millis(), ambient.host_name());

        if let Some(method) = &ambient.method {
            entry.insert("httpMethod", method.as_str());
        }
        if let Some(duration) = self.elapsed_micros(now, ambient) {
            entry.insert("duration", duration);
        }
        if let Some(ip) = ambient.client_ip() {
            entry.insert("ip", ip);
        }
        if let Some(uri) = ambient.uri.as_deref().filter(|uri| !uri.is_empty()) {
            entry.insert("path", uri);
        }
        if let Some(agent) = ambient.user_agent.as_deref().filter(|agent| !agent.is_empty()) {
            entry.insert("userAgent", agent);
        }

        for value in context.values() {
            entry.apply(value);
        }

        let mut parts: Vec<Scalar> = Vec::new();
        let mut derived: Option<Vec<Frame>> = None;

        for arg in args {
            if self.message_handler.handle(&arg, &mut parts, &mut entry) {
                continue;
            }

            match arg {
                LogArg::Error(error) => {
                    parts.push(Scalar::Str(error.message().to_string()));
                    derived = Some(error.stacktrace());
                }
                LogArg::Index(index) => entry.merge_index(&index),
                LogArg::Meta(meta) => entry.merge_meta(&meta),
                LogArg::Raw(raw) => entry.merge_raw(&raw),
                LogArg::Scalar(scalar) => parts.push(scalar),
                LogArg::Other(text) => parts.push(Scalar::Str(text)),
            }
        }

        if !entry.contains_key(MESSAGE) {
            entry.insert(MESSAGE, assemble_message(&parts));
        }

        match entry.get(STACKTRACE) {
            None => {
                let frames = derived
                    .filter(|frames| !frames.is_empty())
                    .unwrap_or_else(|| self.extractor.capture());
                entry.set_stacktrace(&frames);
            }
            Some(Value::Null) => {
                entry.remove(STACKTRACE);
            }
            Some(_) => {}
        }

        entry.drop_empty_maps();
        entry
    }

    fn elapsed_micros(&self, now: DateTime<Utc>, ambient: &AmbientContext) -> Option<i64> {
        let mut last = self.last_timestamp.lock();
        let previous = last.or(ambient.request_start);
        *last = Some(now);
        previous.and_then(|previous| (now - previous).num_microseconds())
    }
}

/// Message text from the collected parts
///
/// Several parts are tried as a format string plus arguments; when that
/// fails or substitutes nothing, the parts are joined with spaces.
pub fn assemble_message(parts: &[Scalar]) -> String {
    match parts {
        [] => NO_MESSAGE.to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => {
            let format = first.to_string();
            match sprintf(&format, rest) {
                Some(formatted) if formatted != format => formatted,
                _ => parts
                    .iter()
                    .map(Scalar::to_string)
                    .collect::<Vec<_>>()
                    .join(" "),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn no_stack() -> LogArg {
        Raw::pair("stacktrace", Value::Null).into()
    }

    fn build(args: Vec<LogArg>) -> Entry {
        EntryBuilder::default().build(
            Severity::Informational,
            args,
            &ContextStack::new(),
            &AmbientContext::new(),
        )
    }

    #[test]
    fn test_message_assembly() {
        assert_eq!(assemble_message(&[]), "(no message)");
        assert_eq!(assemble_message(&["X".into()]), "X");
        assert_eq!(assemble_message(&["count: %d".into(), 3.into()]), "count: 3");
        assert_eq!(assemble_message(&["user".into(), 42.into()]), "user 42");
        assert_eq!(assemble_message(&["rate %q".into(), 1.into()]), "rate %q 1");
        assert_eq!(assemble_message(&["%s and %s".into(), "a".into()]), "%s and %s a");
    }

    #[test]
    fn test_scalars_and_others_become_parts() {
        let entry = build(vec![
            "flags".into(),
            true.into(),
            LogArg::from(json!([1, 2])),
            no_stack(),
        ]);
        assert_eq!(entry.message(), Some("flags true [1,2]"));
    }

    #[test]
    fn test_context_then_arguments() {
        let mut stack = ContextStack::new();
        stack.persist(vec![Index::pair("tenant", "acme").into(), Meta::pair("k", "persisted").into()]);
        stack.set(vec![Meta::pair("k", "transient").into()]);

        let entry = EntryBuilder::default().build(
            Severity::Notice,
            vec!["hi".into(), Meta::pair("extra", 1).into(), no_stack()],
            &stack,
            &AmbientContext::new(),
        );

        assert_eq!(entry.indices().unwrap()["tenant"], "acme");
        assert_eq!(entry.meta().unwrap()["k"], "transient");
        assert_eq!(entry.meta().unwrap()["extra"], 1);
        assert!(!entry.contains_key("stacktrace"));
    }

    #[test]
    fn test_raw_message_override_wins() {
        let entry = build(vec!["ignored".into(), Raw::pair("message", "fixed").into(), no_stack()]);
        assert_eq!(entry.message(), Some("fixed"));
    }

    #[test]
    fn test_ambient_fields() {
        let ambient = AmbientContext::new()
            .with_host("shop.example:443")
            .with_method("GET")
            .with_remote_addr("10.1.1.1")
            .with_uri("/cart")
            .with_user_agent("curl/8");

        let entry = EntryBuilder::default().build(
            Severity::Debug,
            vec![no_stack()],
            &ContextStack::new(),
            &ambient,
        );

        assert_eq!(entry.get("host"), Some(&json!("shop.example")));
        assert_eq!(entry.get("httpMethod"), Some(&json!("GET")));
        assert_eq!(entry.get("ip"), Some(&json!("10.1.1.1")));
        assert_eq!(entry.get("path"), Some(&json!("/cart")));
        assert_eq!(entry.get("userAgent"), Some(&json!("curl/8")));
        assert!(!entry.contains_key("duration"));
    }

    #[test]
    fn test_duration_tracks_previous_entry() {
        let builder = EntryBuilder::default();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let ambient = AmbientContext::new().with_request_start(start);
        let stack = ContextStack::new();

        let first = builder.build_at(
            start + chrono::Duration::milliseconds(2),
            Severity::Debug,
            vec![no_stack()],
            &stack,
            &ambient,
        );
        let second = builder.build_at(
            start + chrono::Duration::milliseconds(5),
            Severity::Debug,
            vec![no_stack()],
            &stack,
            &ambient,
        );

        assert_eq!(first.get("duration"), Some(&json!(2000)));
        assert_eq!(second.get("duration"), Some(&json!(3000)));
        assert_eq!(second.get("timestamp"), Some(&json!(start.timestamp_millis() + 5)));
    }

    #[test]
    fn test_error_argument_supplies_stacktrace() {
        let error = CapturedError::at("card declined", "src/pay.rs", 21);
        let entry = build(vec!["charge failed:".into(), error.into()]);

        assert_eq!(entry.message(), Some("charge failed: card declined"));
        let frames = entry.stacktrace().unwrap();
        assert_eq!(frames[0], Frame::at("src/pay.rs", 21).with_note("card declined"));
    }

    #[test]
    fn test_message_handler_intercepts() {
        let handler = |arg: &LogArg, parts: &mut Vec<Scalar>, entry: &mut Entry| match arg {
            LogArg::Scalar(Scalar::Str(text)) if text == "secret" => {
                parts.push("***".into());
                entry.insert("stacktrace", json!([{"note": "from handler"}]));
                true
            }
            _ => false,
        };
        let builder = EntryBuilder::new(Arc::new(handler), StackExtractor::default());
        let entry = builder.build(
            Severity::Alert,
            vec!["secret".into()],
            &ContextStack::new(),
            &AmbientContext::new(),
        );

        assert_eq!(entry.message(), Some("***"));
        assert_eq!(entry.get("stacktrace"), Some(&json!([{"note": "from handler"}])));
    }

    #[test]
    fn test_empty_maps_dropped() {
        let entry = build(vec!["x".into(), no_stack()]);
        assert!(!entry.contains_key("indices"));
        assert!(!entry.contains_key("meta"));
    }
}
