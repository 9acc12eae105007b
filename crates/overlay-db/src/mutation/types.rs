//! Mutation data types: the unit of a local write, its precondition, and the
//! batch shape handed to the network layer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WriteError;
use crate::model::path::FieldPath;
use crate::model::transform::TransformOperation;
use crate::model::value::FieldValue;
use crate::types::DocumentKey;

// ============================================================================
// Identifiers
// ============================================================================

/// Handle correlating a queued batch with its eventual server ack/rejection.
/// Monotonically increasing per client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub i64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch#{}", self.0)
    }
}

// ============================================================================
// Mutation
// ============================================================================

/// Guard evaluated before a mutation applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precondition {
    None,
    /// The document must exist.
    Exists,
    /// The document must exist at exactly this version.
    UpdatedAt(i64),
}

/// Whether a mutation replaces the whole document or patches fields into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    /// Replace the document's contents with the mutation's literal fields.
    Set,
    /// Merge literal fields per path, leaving other fields intact.
    Patch,
}

/// A literal field write: set a concrete value or delete the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralWrite {
    Set(FieldValue),
    Delete,
}

/// One logical write call against one document.
///
/// A mutation may carry literal field writes and field transforms
/// simultaneously, but never both on the same path — constructors enforce
/// that, along with rejecting `Unknown` sentinels in literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub key: DocumentKey,
    pub precondition: Precondition,
    pub kind: MutationKind,
    pub field_values: BTreeMap<FieldPath, LiteralWrite>,
    pub field_transforms: BTreeMap<FieldPath, TransformOperation>,
    /// Assigned by the client when the mutation is enqueued; `0` until then.
    pub mutation_id: i64,
}

impl Mutation {
    /// A whole-document set: `data`'s top-level fields become the document's
    /// new contents, with `transforms` evaluated on top.
    pub fn set(
        key: DocumentKey,
        data: BTreeMap<String, FieldValue>,
        transforms: BTreeMap<FieldPath, TransformOperation>,
    ) -> Result<Self, WriteError> {
        let field_values = data
            .into_iter()
            .map(|(name, value)| {
                // Single-segment paths from non-empty map keys cannot fail.
                let path = FieldPath::new(vec![name])
                    .map_err(|_| WriteError::EmptyWrite)?;
                Ok((path, LiteralWrite::Set(value)))
            })
            .collect::<Result<BTreeMap<_, _>, WriteError>>()?;
        Self::build(key, Precondition::None, MutationKind::Set, field_values, transforms)
    }

    /// A per-field patch. Defaults to requiring the document to exist, the
    /// usual contract for an update call.
    pub fn patch(
        key: DocumentKey,
        field_values: BTreeMap<FieldPath, LiteralWrite>,
        transforms: BTreeMap<FieldPath, TransformOperation>,
    ) -> Result<Self, WriteError> {
        Self::build(key, Precondition::Exists, MutationKind::Patch, field_values, transforms)
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = precondition;
        self
    }

    fn build(
        key: DocumentKey,
        precondition: Precondition,
        kind: MutationKind,
        field_values: BTreeMap<FieldPath, LiteralWrite>,
        field_transforms: BTreeMap<FieldPath, TransformOperation>,
    ) -> Result<Self, WriteError> {
        for path in field_transforms.keys() {
            if field_values.contains_key(path) {
                return Err(WriteError::OverlappingPath(path.clone()));
            }
        }
        for (path, write) in &field_values {
            if let LiteralWrite::Set(value) = write {
                if value.contains_unknown() {
                    return Err(WriteError::UnknownLiteral(path.clone()));
                }
            }
        }
        for op in field_transforms.values() {
            if let TransformOperation::Increment(delta) = op {
                if !delta.is_number() {
                    return Err(WriteError::NonNumericDelta(delta.type_name()));
                }
            }
        }
        Ok(Self {
            key,
            precondition,
            kind,
            field_values,
            field_transforms,
            mutation_id: 0,
        })
    }
}

// ============================================================================
// Batches and server results
// ============================================================================

/// An ordered group of mutations sent to the server together and retired
/// atomically: the whole batch is acknowledged or the whole batch is
/// rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationBatch {
    pub batch_id: BatchId,
    pub mutations: Vec<Mutation>,
}

impl MutationBatch {
    /// Keys touched by this batch, deduplicated, in first-touch order.
    pub fn affected_keys(&self) -> Vec<DocumentKey> {
        let mut keys: Vec<DocumentKey> = Vec::new();
        for mutation in &self.mutations {
            if !keys.contains(&mutation.key) {
                keys.push(mutation.key.clone());
            }
        }
        keys
    }
}

/// The server's authoritative result for one mutation in an acknowledged
/// batch: the concrete post-transform value for every transformed path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResult {
    pub transform_results: BTreeMap<FieldPath, FieldValue>,
}
