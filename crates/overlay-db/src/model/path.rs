//! FieldPath — a dot-notation location inside a document's map.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when constructing an invalid [`FieldPath`].
#[derive(Debug, Error)]
pub enum FieldPathError {
    #[error("field path must have at least one segment")]
    Empty,

    #[error("field path segment must not be empty")]
    EmptySegment,
}

/// A non-empty ordered sequence of field-name segments identifying a location
/// within a document's map.
///
/// Paths are compared segment-wise, so `a.b` sorts before `a.b.c`, which makes
/// `BTreeMap<FieldPath, _>` iterate parents before children.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Build a path from segments. Fails on an empty list or empty segment.
    pub fn new(segments: Vec<String>) -> Result<Self, FieldPathError> {
        if segments.is_empty() {
            return Err(FieldPathError::Empty);
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(FieldPathError::EmptySegment);
        }
        Ok(Self(segments))
    }

    /// Parse a dotted path like `"a.b.c"`.
    pub fn parse(dotted: &str) -> Result<Self, FieldPathError> {
        Self::new(dotted.split('.').map(str::to_string).collect())
    }

    /// The path segments, in order. Never empty.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The first segment.
    pub fn head(&self) -> &str {
        &self.0[0]
    }

    /// The path with the first segment removed, or `None` for a single-segment
    /// path.
    pub fn tail(&self) -> Option<FieldPath> {
        if self.0.len() <= 1 {
            None
        } else {
            Some(FieldPath(self.0[1..].to_vec()))
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}
