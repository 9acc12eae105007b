//! FieldValue — the closed tagged union over document field values.
//!
//! Equality is structural. The two numeric kinds compare across each other
//! (`Integer(1) == Double(1.0)`) and `Double(NaN) == Double(NaN)`, so element
//! lookup during array union/remove is total. `Unknown` is a sentinel meaning
//! "no local estimate available, defer to the server" and never survives into
//! an acknowledged view.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::path::FieldPath;

/// A single document field value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    /// A reference to another document, stored as its path string.
    Reference(String),
    Array(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
    /// Placeholder for a value only the server can produce (e.g. a pending
    /// server timestamp). Rendered to callers as-is in local views.
    Unknown,
}

impl FieldValue {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Integer(_) => "integer",
            FieldValue::Double(_) => "double",
            FieldValue::String(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Reference(_) => "reference",
            FieldValue::Array(_) => "array",
            FieldValue::Map(_) => "map",
            FieldValue::Unknown => "unknown",
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, FieldValue::Integer(_) | FieldValue::Double(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldValue::Array(_))
    }

    /// True if this value or any nested value is [`FieldValue::Unknown`].
    pub fn contains_unknown(&self) -> bool {
        match self {
            FieldValue::Unknown => true,
            FieldValue::Array(items) => items.iter().any(FieldValue::contains_unknown),
            FieldValue::Map(fields) => fields.values().any(FieldValue::contains_unknown),
            _ => false,
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        use FieldValue::*;
        match (self, other) {
            (Null, Null) | (Unknown, Unknown) => true,
            (Bool(a), Bool(b)) => a == b,
            // Numbers compare by value across kinds; NaN equals NaN so that
            // dedup and removal treat every element consistently.
            (Integer(a), Integer(b)) => a == b,
            (Double(a), Double(b)) => (a.is_nan() && b.is_nan()) || a == b,
            (Integer(a), Double(b)) | (Double(b), Integer(a)) => *a as f64 == *b,
            (String(a), String(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (Reference(a), Reference(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            _ => false,
        }
    }
}

// ============================================================================
// ObjectValue
// ============================================================================

/// An immutable-by-convention document map with path-addressed access.
///
/// `set` creates intermediate maps as needed; `delete` removes the leaf and
/// leaves emptied parents in place (an empty map is a legal value).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectValue(BTreeMap<String, FieldValue>);

impl ObjectValue {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn from_map(fields: BTreeMap<String, FieldValue>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, FieldValue> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value at `path`, or `None` if any segment is missing or a non-map is
    /// hit before the leaf.
    pub fn get(&self, path: &FieldPath) -> Option<&FieldValue> {
        let mut current: &BTreeMap<String, FieldValue> = &self.0;
        let segments = path.segments();
        for segment in &segments[..segments.len() - 1] {
            match current.get(segment) {
                Some(FieldValue::Map(inner)) => current = inner,
                _ => return None,
            }
        }
        current.get(&segments[segments.len() - 1])
    }

    /// Set `value` at `path`, replacing any non-map intermediate with a map.
    pub fn set(&mut self, path: &FieldPath, value: FieldValue) {
        let segments = path.segments();
        let mut current: &mut BTreeMap<String, FieldValue> = &mut self.0;
        for segment in &segments[..segments.len() - 1] {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| FieldValue::Map(BTreeMap::new()));
            if !matches!(entry, FieldValue::Map(_)) {
                *entry = FieldValue::Map(BTreeMap::new());
            }
            match entry {
                FieldValue::Map(inner) => current = inner,
                _ => unreachable!("entry was just made a map"),
            }
        }
        current.insert(segments[segments.len() - 1].clone(), value);
    }

    /// Remove the value at `path`. Missing paths are a no-op.
    pub fn delete(&mut self, path: &FieldPath) {
        let segments = path.segments();
        let mut current: &mut BTreeMap<String, FieldValue> = &mut self.0;
        for segment in &segments[..segments.len() - 1] {
            match current.get_mut(segment) {
                Some(FieldValue::Map(inner)) => current = inner,
                _ => return,
            }
        }
        current.remove(&segments[segments.len() - 1]);
    }

    /// True if any field (at any depth) is [`FieldValue::Unknown`].
    pub fn contains_unknown(&self) -> bool {
        self.0.values().any(FieldValue::contains_unknown)
    }
}
