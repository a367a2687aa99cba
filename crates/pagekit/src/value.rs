//! The recursive value tree stored inside page sections
//!
//! Containers are reference counted so that two versions of a document can
//! share every subtree that an edit did not touch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Ordered key/value node of a section tree
pub type Mapping = BTreeMap<String, SectionValue>;

/// A node in a page section: a scalar, an ordered list or a mapping
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionValue {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Arc<Vec<SectionValue>>),
    Map(Arc<Mapping>),
}

impl SectionValue {
    /// A new, empty mapping node
    pub fn empty_map() -> Self {
        SectionValue::Map(Arc::new(Mapping::new()))
    }

    /// A new, empty list node
    pub fn empty_list() -> Self {
        SectionValue::List(Arc::new(Vec::new()))
    }

    /// Build a mapping node from key/value pairs
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<SectionValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        SectionValue::Map(Arc::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    /// Build a list node from items
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<SectionValue>,
        I: IntoIterator<Item = V>,
    {
        SectionValue::List(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SectionValue::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, SectionValue::Map(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, SectionValue::List(_))
    }

    pub fn is_scalar(&self) -> bool {
        !self.is_map() && !self.is_list()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SectionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SectionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SectionValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            SectionValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SectionValue]> {
        match self {
            SectionValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a key on a mapping node
    pub fn get(&self, key: &str) -> Option<&SectionValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Short name of the node shape, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            SectionValue::Null => "null",
            SectionValue::Bool(_) => "boolean",
            SectionValue::Number(_) => "number",
            SectionValue::String(_) => "string",
            SectionValue::List(_) => "list",
            SectionValue::Map(_) => "mapping",
        }
    }

    /// Render a scalar as text (strings verbatim, numbers and booleans formatted)
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            SectionValue::String(s) => Some(s.clone()),
            SectionValue::Number(n) => Some(n.to_string()),
            SectionValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// True when both values are the same shared container.
    ///
    /// Scalars never compare as shared.
    pub fn ptr_eq(&self, other: &SectionValue) -> bool {
        match (self, other) {
            (SectionValue::Map(a), SectionValue::Map(b)) => Arc::ptr_eq(a, b),
            (SectionValue::List(a), SectionValue::List(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Shallow merge: fields of `patch` override fields of `self` when both
    /// are mappings; any other combination yields `patch`.
    pub fn merged_with(&self, patch: &SectionValue) -> SectionValue {
        match (self, patch) {
            (SectionValue::Map(base), SectionValue::Map(fields)) => {
                let mut merged = Mapping::clone(base);
                for (key, value) in fields.iter() {
                    merged.insert(key.clone(), value.clone());
                }
                SectionValue::Map(Arc::new(merged))
            }
            _ => patch.clone(),
        }
    }
}

impl From<&str> for SectionValue {
    fn from(value: &str) -> Self {
        SectionValue::String(value.to_string())
    }
}

impl From<String> for SectionValue {
    fn from(value: String) -> Self {
        SectionValue::String(value)
    }
}

impl From<bool> for SectionValue {
    fn from(value: bool) -> Self {
        SectionValue::Bool(value)
    }
}

impl From<i64> for SectionValue {
    fn from(value: i64) -> Self {
        SectionValue::Number(value.into())
    }
}

impl From<u64> for SectionValue {
    fn from(value: u64) -> Self {
        SectionValue::Number(value.into())
    }
}

impl From<f64> for SectionValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(SectionValue::Number)
            .unwrap_or(SectionValue::Null)
    }
}

impl From<Mapping> for SectionValue {
    fn from(value: Mapping) -> Self {
        SectionValue::Map(Arc::new(value))
    }
}

impl From<Vec<SectionValue>> for SectionValue {
    fn from(value: Vec<SectionValue>) -> Self {
        SectionValue::List(Arc::new(value))
    }
}

impl From<serde_json::Value> for SectionValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => SectionValue::Null,
            serde_json::Value::Bool(b) => SectionValue::Bool(b),
            serde_json::Value::Number(n) => SectionValue::Number(n),
            serde_json::Value::String(s) => SectionValue::String(s),
            serde_json::Value::Array(items) => {
                SectionValue::List(Arc::new(items.into_iter().map(Into::into).collect()))
            }
            serde_json::Value::Object(fields) => SectionValue::Map(Arc::new(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            )),
        }
    }
}

impl From<&SectionValue> for serde_json::Value {
    fn from(value: &SectionValue) -> Self {
        match value {
            SectionValue::Null => serde_json::Value::Null,
            SectionValue::Bool(b) => serde_json::Value::Bool(*b),
            SectionValue::Number(n) => serde_json::Value::Number(n.clone()),
            SectionValue::String(s) => serde_json::Value::String(s.clone()),
            SectionValue::List(items) => {
                serde_json::Value::Array(items.iter().map(Into::into).collect())
            }
            SectionValue::Map(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.into()))
                    .collect(),
            ),
        }
    }
}

impl From<SectionValue> for serde_json::Value {
    fn from(value: SectionValue) -> Self {
        serde_json::Value::from(&value)
    }
}
