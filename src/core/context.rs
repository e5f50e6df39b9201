//! Context values and layered context
//!
//! This module provides:
//! - `Index`, `Meta`, `Raw`: typed key-value bags attachable to entries
//! - `ContextValue`: the closed union of the three, used in layers
//! - `ContextStack`: persistent and transient layers applied to every entry
//! - `ContextGuard`: RAII guard for a scoped transient layer

use super::format::Scalar;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Shared accessor of the three context kinds
pub trait ContextMap {
    fn entries(&self) -> &Map<String, Value>;

    fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}

/// Filterable dimensions. Values are always trimmed strings.
///
/// # Example
///
/// ```
/// use rust_event_logger::{ContextMap, Index};
///
/// let index = Index::pair("user", "  alice ").with("tags", vec!["a", "b"]);
/// assert_eq!(index.entries()["user"], "alice");
/// assert!(!index.entries().contains_key("tags"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Index {
    fields: Map<String, Value>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pair(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with(key, value)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |index, (key, value)| index.with(key, value))
    }

    /// Add a dimension. Non-scalar values are silently dropped.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Some(text) = index_text(&value.into()) {
            self.fields.insert(key.into(), Value::String(text));
        }
        self
    }
}

fn index_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => Scalar::from_number(n).to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    Some(trim_text(&text).to_string())
}

fn trim_text(text: &str) -> &str {
    text.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0B'))
}

/// Unrestricted structured metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meta {
    fields: Map<String, Value>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pair(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with(key, value)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |meta, (key, value)| meta.with(key, value))
    }

    /// Build from any serializable value.
    ///
    /// Objects contribute their fields; any other value lands under key `"0"`.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Self> {
        let fields = match serde_json::to_value(value)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("0".to_string(), other);
                map
            }
        };
        Ok(Self { fields })
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Literal top-level entry fields, able to override reserved keys.
///
/// Setting `stacktrace` to null suppresses stack capture for the entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Raw {
    fields: Map<String, Value>,
}

impl Raw {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pair(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with(key, value)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |raw, (key, value)| raw.with(key, value))
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

macro_rules! impl_context_map {
    ($($ty:ty),*) => {$(
        impl ContextMap for $ty {
            fn entries(&self) -> &Map<String, Value> {
                &self.fields
            }
        }
    )*};
}

impl_context_map!(Index, Meta, Raw);

/// One context value of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Index(Index),
    Meta(Meta),
    Raw(Raw),
}

impl ContextMap for ContextValue {
    fn entries(&self) -> &Map<String, Value> {
        match self {
            ContextValue::Index(index) => index.entries(),
            ContextValue::Meta(meta) => meta.entries(),
            ContextValue::Raw(raw) => raw.entries(),
        }
    }
}

impl From<Index> for ContextValue {
    fn from(index: Index) -> Self {
        ContextValue::Index(index)
    }
}

impl From<Meta> for ContextValue {
    fn from(meta: Meta) -> Self {
        ContextValue::Meta(meta)
    }
}

impl From<Raw> for ContextValue {
    fn from(raw: Raw) -> Self {
        ContextValue::Raw(raw)
    }
}

/// Ordered list of context values applied together
pub type ContextLayer = Vec<ContextValue>;

/// Persistent and transient context layers
///
/// Persistent layers are applied first, then transient layers, each in
/// insertion order. Later values overwrite earlier keys.
///
/// # Example
///
/// ```
/// use rust_event_logger::{ContextStack, Index, Meta};
///
/// let mut stack = ContextStack::new();
/// stack.persist(vec![Index::pair("service", "billing").into()]);
///
/// let first = stack.set(vec![Meta::pair("request", 1).into()]);
/// stack.set(vec![Meta::pair("step", "charge").into()]);
/// assert_eq!(stack.transient_len(), 2);
///
/// stack.reset_to(first);
/// assert_eq!(stack.transient_len(), 0);
/// assert_eq!(stack.persistent_len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
    persistent: Vec<ContextLayer>,
    transient: Vec<ContextLayer>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer that no reset removes
    pub fn persist(&mut self, layer: impl IntoIterator<Item = ContextValue>) {
        self.persistent.push(layer.into_iter().collect());
    }

    /// Add a transient layer and return its index
    pub fn set(&mut self, layer: impl IntoIterator<Item = ContextValue>) -> usize {
        self.transient.push(layer.into_iter().collect());
        self.transient.len() - 1
    }

    /// Remove the most recent transient layer
    pub fn reset(&mut self) {
        self.transient.pop();
    }

    /// Remove the transient layer at `index` and everything set after it
    pub fn reset_to(&mut self, index: usize) {
        self.transient.truncate(index);
    }

    /// Remove every transient layer
    pub fn clear(&mut self) {
        self.reset_to(0);
    }

    pub fn persistent_len(&self) -> usize {
        self.persistent.len()
    }

    pub fn transient_len(&self) -> usize {
        self.transient.len()
    }

    /// Every value in application order
    pub fn values(&self) -> impl Iterator<Item = &ContextValue> {
        self.persistent
            .iter()
            .chain(self.transient.iter())
            .flat_map(|layer| layer.iter())
    }
}

/// RAII guard for a scoped transient layer
///
/// When dropped, resets the stack to the layer's index, removing the layer
/// and anything set after it.
pub struct ContextGuard {
    stack: Arc<RwLock<ContextStack>>,
    index: usize,
}

impl ContextGuard {
    pub(crate) fn new(stack: Arc<RwLock<ContextStack>>, index: usize) -> Self {
        Self { stack, index }
    }

    /// Index of the guarded layer
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.stack.write().reset_to(self.index);
    }
}
