//! Log entry structure
//!
//! An entry is a JSON object. Raw context values may set any top-level key,
//! so the entry keeps its fields as an ordered map rather than a fixed
//! struct, and offers typed accessors for the well-known keys.

use super::context::{ContextMap, ContextValue, Index, Meta, Raw};
use super::error::Result;
use super::severity::Severity;
use super::stacktrace::Frame;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Value of the `app` field
pub const APP_TAG: &str = "rust";

/// Value of the `facility` field (user-level messages)
pub const FACILITY: u8 = 1;

/// Message used when a call has no message parts
pub const NO_MESSAGE: &str = "(no message)";

pub const INDICES: &str = "indices";
pub const META: &str = "meta";
pub const MESSAGE: &str = "message";
pub const STACKTRACE: &str = "stacktrace";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entry {
    fields: Map<String, Value>,
}

impl Entry {
    /// Entry with the required fields and empty `indices`/`meta`
    pub fn new(severity: Severity, timestamp_ms: i64, host: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("app".to_string(), Value::from(APP_TAG));
        fields.insert("timestamp".to_string(), Value::from(timestamp_ms));
        fields.insert("host".to_string(), Value::String(host.into()));
        fields.insert("severity".to_string(), Value::from(severity.code()));
        fields.insert("facility".to_string(), Value::from(FACILITY));
        fields.insert(INDICES.to_string(), Value::Object(Map::new()));
        fields.insert(META.to_string(), Value::Object(Map::new()));
        Self { fields }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    pub fn message(&self) -> Option<&str> {
        self.fields.get(MESSAGE).and_then(Value::as_str)
    }

    pub fn severity(&self) -> Option<Severity> {
        self.fields
            .get("severity")
            .and_then(Value::as_u64)
            .and_then(|code| u8::try_from(code).ok())
            .and_then(Severity::from_code)
    }

    pub fn indices(&self) -> Option<&Map<String, Value>> {
        self.fields.get(INDICES).and_then(Value::as_object)
    }

    pub fn meta(&self) -> Option<&Map<String, Value>> {
        self.fields.get(META).and_then(Value::as_object)
    }

    /// Frames of the `stacktrace` field, if it holds a frame list
    pub fn stacktrace(&self) -> Option<Vec<Frame>> {
        self.fields
            .get(STACKTRACE)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set_stacktrace(&mut self, frames: &[Frame]) {
        let frames = serde_json::to_value(frames).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to serialize stacktrace");
            Value::Array(Vec::new())
        });
        self.fields.insert(STACKTRACE.to_string(), frames);
    }

    pub fn merge_index(&mut self, index: &Index) {
        self.merge_nested(INDICES, index.entries());
    }

    pub fn merge_meta(&mut self, meta: &Meta) {
        self.merge_nested(META, meta.entries());
    }

    /// Merge directly into the top level, overriding reserved keys
    pub fn merge_raw(&mut self, raw: &Raw) {
        for (key, value) in raw.entries() {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    pub fn apply(&mut self, value: &ContextValue) {
        match value {
            ContextValue::Index(index) => self.merge_index(index),
            ContextValue::Meta(meta) => self.merge_meta(meta),
            ContextValue::Raw(raw) => self.merge_raw(raw),
        }
    }

    // A raw override may have replaced the map with something else
    fn merge_nested(&mut self, key: &str, entries: &Map<String, Value>) {
        let slot = self
            .fields
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(map) = slot {
            for (k, v) in entries {
                map.insert(k.clone(), v.clone());
            }
        }
    }

    /// Drop `indices` and `meta` when they ended up empty
    pub fn drop_empty_maps(&mut self) {
        for key in [INDICES, META] {
            let empty = match self.fields.get(key) {
                Some(Value::Object(map)) => map.is_empty(),
                Some(Value::Array(items)) => items.is_empty(),
                Some(Value::Null) => true,
                _ => false,
            };
            if empty {
                self.fields.shift_remove(key);
            }
        }
    }

    /// Serialize to a single line of JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_entry_has_required_fields() {
        let entry = Entry::new(Severity::Warning, 1_700_000_000_123, "web-1");

        assert_eq!(entry.get("app"), Some(&json!("rust")));
        assert_eq!(entry.get("timestamp"), Some(&json!(1_700_000_000_123i64)));
        assert_eq!(entry.get("host"), Some(&json!("web-1")));
        assert_eq!(entry.severity(), Some(Severity::Warning));
        assert_eq!(entry.get("facility"), Some(&json!(1)));
    }

    #[test]
    fn test_merge_last_writer_wins() {
        let mut entry = Entry::new(Severity::Debug, 0, "h");
        entry.merge_index(&Index::pair("user", "a").with("region", "eu"));
        entry.merge_index(&Index::pair("user", "b"));
        entry.merge_meta(&Meta::pair("attempt", 1));

        assert_eq!(entry.indices().unwrap()["user"], "b");
        assert_eq!(entry.indices().unwrap()["region"], "eu");
        assert_eq!(entry.meta().unwrap()["attempt"], 1);
    }

    #[test]
    fn test_raw_overrides_top_level() {
        let mut entry = Entry::new(Severity::Debug, 0, "h");
        entry.merge_raw(&Raw::pair("host", "override").with("custom", true));

        assert_eq!(entry.get("host"), Some(&json!("override")));
        assert_eq!(entry.get("custom"), Some(&json!(true)));
    }

    #[test]
    fn test_merge_after_raw_replaced_map() {
        let mut entry = Entry::new(Severity::Debug, 0, "h");
        entry.merge_raw(&Raw::pair("meta", "flat"));
        entry.merge_meta(&Meta::pair("k", "v"));
        assert_eq!(entry.meta().unwrap()["k"], "v");
    }

    #[test]
    fn test_drop_empty_maps() {
        let mut entry = Entry::new(Severity::Debug, 0, "h");
        entry.merge_meta(&Meta::pair("k", "v"));
        entry.drop_empty_maps();

        assert!(!entry.contains_key("indices"));
        assert!(entry.contains_key("meta"));
    }

    #[test]
    fn test_stacktrace_roundtrip() {
        let mut entry = Entry::new(Severity::Error, 0, "h");
        let frames = vec![
            Frame::at("src/main.rs", 4).with_note("boom"),
            Frame::default().with_callee("app::run"),
        ];
        entry.set_stacktrace(&frames);

        assert_eq!(entry.stacktrace(), Some(frames));
        let json = entry.to_json().unwrap();
        assert!(json.contains(r#""stacktrace":[{"path":"src/main.rs","line":4,"note":"boom"},{"callee":"app::run"}]"#));
    }

    #[test]
    fn test_empty_stacktrace_is_kept() {
        let mut entry = Entry::new(Severity::Error, 0, "h");
        entry.set_stacktrace(&[]);

        assert_eq!(entry.get(STACKTRACE), Some(&json!([])));
        assert_eq!(entry.stacktrace(), Some(Vec::new()));
    }

    #[test]
    fn test_json_keeps_field_order() {
        let entry = Entry::new(Severity::Notice, 5, "h");
        let json = entry.to_json().unwrap();
        assert!(json.starts_with(r#"{"app":"rust","timestamp":5,"host":"h","severity":5,"facility":1"#));

        let parsed = Entry::from_json(&json).unwrap();
        assert_eq!(parsed, entry);
    }
}
