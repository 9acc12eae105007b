//! TransformOperation — field-level operations whose final value depends on
//! server-side state unknown to the client at write time.

use serde::{Deserialize, Serialize};

use super::value::FieldValue;

/// A transform applied to a single field path as part of a mutation.
///
/// Carries no document reference; it is pure operation data. The local
/// estimate and server-result semantics live in [`crate::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformOperation {
    /// Append each element not already present (structural equality),
    /// preserving first-seen order.
    ArrayUnion(Vec<FieldValue>),
    /// Remove all elements structurally equal to any of these.
    ArrayRemove(Vec<FieldValue>),
    /// Add a numeric delta. The payload must be `Integer` or `Double`;
    /// constructors on [`crate::mutation::Mutation`] enforce this.
    Increment(FieldValue),
    /// Resolved to the commit time by the server; locally estimated as
    /// [`FieldValue::Unknown`].
    ServerTimestamp,
}

impl TransformOperation {
    /// Short operation name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            TransformOperation::ArrayUnion(_) => "arrayUnion",
            TransformOperation::ArrayRemove(_) => "arrayRemove",
            TransformOperation::Increment(_) => "increment",
            TransformOperation::ServerTimestamp => "serverTimestamp",
        }
    }
}
