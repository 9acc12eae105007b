//! Reconciler — applies server acknowledgements and remote document changes
//! to a document's acknowledged state.
//!
//! These are pure per-document step functions; the client drives them under
//! each document's serialization point and owns queue retirement, event
//! delivery, and persistence.
//!
//! Versions are monotonic per document. For acknowledgements that monotonic
//! rule scopes to the version bump: a batch's writes always apply (delivery
//! order is not commit order, and the writes are deltas the server really
//! committed), but an older version never overwrites a newer one — which is
//! what makes out-of-order acknowledgement converge to the same final view as
//! in-order. A *remote change* carries whole-document state, so there a stale
//! version means the entire change is ignored.

use crate::apply::{apply_mutation, ApplyMode};
use crate::model::value::ObjectValue;
use crate::mutation::types::{Mutation, MutationResult};

/// Acknowledged per-document state held behind the document's serialization
/// point.
#[derive(Debug, Clone, Default)]
pub struct DocumentState {
    /// Server-confirmed contents; `None` means the document does not exist.
    pub data: Option<ObjectValue>,
    /// Last server-assigned version, `0` before any server contact.
    pub version: i64,
    /// True once any server-assigned version has been observed.
    pub synced: bool,
}

impl DocumentState {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn new(data: Option<ObjectValue>, version: i64) -> Self {
        Self {
            data,
            version,
            synced: version > 0,
        }
    }
}

/// How an acknowledgement affected the document's version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckVersion {
    Advanced,
    /// The ack carried a version older than the current one; the writes
    /// applied but the version was kept. Callers log this as a stale ack.
    HeldBack { incoming: i64, current: i64 },
}

/// Outcome of a whole-document remote change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied,
    /// The incoming version is older than the current acknowledged version;
    /// nothing was applied.
    Stale { incoming: i64, current: i64 },
}

/// Apply an acknowledged batch's mutations for one document.
///
/// Literal field writes apply directly; transform paths are substituted with
/// the server's concrete results. Preconditions are not re-checked — the
/// server already accepted the batch.
pub fn acknowledge(
    state: &mut DocumentState,
    mutations: &[&Mutation],
    results: &[&MutationResult],
    version: i64,
) -> AckVersion {
    let mut data = state.data.take();
    // Server-result mode reports no field errors; the sink stays empty.
    let mut sink = Vec::new();
    let empty = MutationResult::default();
    for (index, mutation) in mutations.iter().enumerate() {
        let result = results.get(index).copied().unwrap_or(&empty);
        data = apply_mutation(
            data,
            state.version,
            mutation,
            &ApplyMode::ServerResults(&result.transform_results),
            &mut sink,
        );
    }
    state.data = data;

    let outcome = if state.synced && version < state.version {
        AckVersion::HeldBack {
            incoming: version,
            current: state.version,
        }
    } else {
        state.version = version;
        AckVersion::Advanced
    };
    state.synced = true;
    outcome
}

/// Apply an unsolicited remote document change (a write from another client
/// arriving through the sync channel). Remote changes carry the whole
/// document, so the acknowledged view is replaced, not merged — and a stale
/// version means the change is dropped entirely.
pub fn remote_change(
    state: &mut DocumentState,
    data: Option<ObjectValue>,
    version: i64,
) -> ReconcileOutcome {
    if state.synced && version < state.version {
        return ReconcileOutcome::Stale {
            incoming: version,
            current: state.version,
        };
    }

    state.data = data;
    state.version = version;
    state.synced = true;
    ReconcileOutcome::Applied
}
