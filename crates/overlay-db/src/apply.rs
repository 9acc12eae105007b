//! Transform applier — evaluates transform operations against a base value
//! and folds mutations into document views.
//!
//! Two modes share one operation set:
//!
//! - **Local estimate** — best effort against a base that may be `Unknown`;
//!   used for the optimistic local view before any server round trip.
//! - **Server result** — substitution of the authoritative post-transform
//!   value the server returned; used during reconciliation. The server is the
//!   single source of truth for final transform results, never the local
//!   estimator.
//!
//! A `TypeMismatch` never fails a whole view computation: the offending path
//! keeps its pre-transform value and the error is collected for out-of-band
//! reporting to the caller that originated the write.

use std::collections::BTreeMap;

use crate::error::TransformError;
use crate::model::path::FieldPath;
use crate::model::transform::TransformOperation;
use crate::model::value::{FieldValue, ObjectValue};
use crate::mutation::types::{LiteralWrite, Mutation, MutationKind, Precondition};

// ============================================================================
// Modes and reporting
// ============================================================================

/// How transform paths are resolved while folding a mutation.
pub enum ApplyMode<'a> {
    /// Estimate locally from the current working value.
    LocalEstimate,
    /// Substitute the server's concrete per-path results.
    ServerResults(&'a BTreeMap<FieldPath, FieldValue>),
}

/// A per-field transform failure, reported to the originating caller only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: FieldPath,
    pub error: TransformError,
}

/// Result of folding a document's queued mutations over its acknowledged base.
#[derive(Debug)]
pub struct LocalFold {
    pub data: Option<ObjectValue>,
    /// `(mutation_id, error)` pairs, so the client can route each error to
    /// the write that caused it.
    pub transform_errors: Vec<(i64, FieldError)>,
}

// ============================================================================
// Single-operation local estimates
// ============================================================================

/// Evaluate one transform in local-estimate mode.
///
/// `base` is the current value at the transform's path, `None` if absent.
/// Fails with `TypeMismatch` only when the base is a concrete, incompatible
/// type; an absent or `Unknown` base always yields an estimate.
pub fn local_estimate(
    op: &TransformOperation,
    path: &FieldPath,
    base: Option<&FieldValue>,
) -> Result<FieldValue, TransformError> {
    match op {
        TransformOperation::ArrayUnion(elements) => match base {
            Some(FieldValue::Array(existing)) => {
                let mut merged = existing.clone();
                for element in elements {
                    if !merged.contains(element) {
                        merged.push(element.clone());
                    }
                }
                Ok(FieldValue::Array(merged))
            }
            // Unknown, absent, or non-array base: the estimate is the
            // elements themselves, deduplicated in first-seen order.
            _ => {
                let mut deduped: Vec<FieldValue> = Vec::new();
                for element in elements {
                    if !deduped.contains(element) {
                        deduped.push(element.clone());
                    }
                }
                Ok(FieldValue::Array(deduped))
            }
        },

        TransformOperation::ArrayRemove(elements) => match base {
            Some(FieldValue::Array(existing)) => Ok(FieldValue::Array(
                existing
                    .iter()
                    .filter(|v| !elements.contains(v))
                    .cloned()
                    .collect(),
            )),
            _ => Ok(FieldValue::Array(Vec::new())),
        },

        TransformOperation::Increment(delta) => match base {
            Some(FieldValue::Integer(base_int)) => match delta {
                FieldValue::Integer(d) => Ok(FieldValue::Integer(base_int.saturating_add(*d))),
                FieldValue::Double(d) => Ok(FieldValue::Double(*base_int as f64 + d)),
                other => Err(type_mismatch(op, path, other.type_name())),
            },
            Some(FieldValue::Double(base_double)) => match delta {
                FieldValue::Integer(d) => Ok(FieldValue::Double(base_double + *d as f64)),
                FieldValue::Double(d) => Ok(FieldValue::Double(base_double + d)),
                other => Err(type_mismatch(op, path, other.type_name())),
            },
            // Unknown or absent base: the delta itself is the estimate.
            None | Some(FieldValue::Unknown) => Ok(delta.clone()),
            Some(concrete) => Err(type_mismatch(op, path, concrete.type_name())),
        },

        // The true value cannot be known locally; render a caller-visible
        // placeholder rather than fabricating a timestamp.
        TransformOperation::ServerTimestamp => Ok(FieldValue::Unknown),
    }
}

fn type_mismatch(
    op: &TransformOperation,
    path: &FieldPath,
    base_type: &'static str,
) -> TransformError {
    TransformError::TypeMismatch {
        path: path.clone(),
        operation: op.name(),
        base_type,
    }
}

// ============================================================================
// Mutation folding
// ============================================================================

/// True if `precondition` holds for the given view.
pub fn precondition_met(
    precondition: Precondition,
    data: Option<&ObjectValue>,
    version: i64,
) -> bool {
    match precondition {
        Precondition::None => true,
        Precondition::Exists => data.is_some(),
        Precondition::UpdatedAt(v) => data.is_some() && version == v,
    }
}

/// Fold one mutation into a document view.
///
/// In local-estimate mode an unmet precondition skips the mutation (no
/// optimistic effect); in server-result mode the server already accepted the
/// batch, so preconditions are not re-checked locally. Transform failures go
/// into `errors`; the rest of the write still applies.
pub fn apply_mutation(
    data: Option<ObjectValue>,
    version: i64,
    mutation: &Mutation,
    mode: &ApplyMode<'_>,
    errors: &mut Vec<FieldError>,
) -> Option<ObjectValue> {
    if matches!(*mode, ApplyMode::LocalEstimate)
        && !precondition_met(mutation.precondition, data.as_ref(), version)
    {
        return data;
    }

    let mut working = match mutation.kind {
        MutationKind::Set => ObjectValue::new(),
        MutationKind::Patch => data.unwrap_or_default(),
    };

    for (path, write) in &mutation.field_values {
        match write {
            LiteralWrite::Set(value) => working.set(path, value.clone()),
            LiteralWrite::Delete => working.delete(path),
        }
    }

    for (path, op) in &mutation.field_transforms {
        match mode {
            ApplyMode::LocalEstimate => match local_estimate(op, path, working.get(path)) {
                Ok(value) => working.set(path, value),
                Err(error) => errors.push(FieldError {
                    path: path.clone(),
                    error,
                }),
            },
            ApplyMode::ServerResults(results) => {
                // The server provides one concrete value per transformed
                // path; a missing entry leaves the field untouched.
                if let Some(value) = results.get(path) {
                    working.set(path, value.clone());
                }
            }
        }
    }

    Some(working)
}

/// Fold every queued mutation for a document over its acknowledged base, in
/// enqueue order. Deterministic, no I/O.
pub fn fold_local(
    base: Option<&ObjectValue>,
    base_version: i64,
    mutations: &[Mutation],
) -> LocalFold {
    let mut data = base.cloned();
    let mut transform_errors = Vec::new();
    for mutation in mutations {
        let mut errors = Vec::new();
        data = apply_mutation(data, base_version, mutation, &ApplyMode::LocalEstimate, &mut errors);
        transform_errors.extend(errors.into_iter().map(|e| (mutation.mutation_id, e)));
    }
    LocalFold {
        data,
        transform_errors,
    }
}
