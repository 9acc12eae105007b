//! DocumentCache — the narrow local-persistence contract this core consumes.
//!
//! The cache is exactly that: it supplies the last persisted acknowledged
//! view as a base for recomputation and is informed after each successful
//! reconciliation. It is never a source of truth.

use serde_json::Value;

use crate::error::CacheError;
use crate::types::DocumentKey;

/// A persisted acknowledged view.
///
/// `data` is the serde-tagged JSON form of the document's `ObjectValue`;
/// `None` records nonexistence at `version` (a tombstone), which is distinct
/// from the document never having been cached at all.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDocument {
    pub data: Option<Value>,
    pub version: i64,
}

/// Implementors must be `Send + Sync`; all methods are synchronous and are
/// called from within a document's serialization point, so they should not
/// block for long.
pub trait DocumentCache: Send + Sync {
    /// Fetch the persisted acknowledged view, or `None` if the document has
    /// never been persisted.
    fn load(&self, key: &DocumentKey) -> Result<Option<CachedDocument>, CacheError>;

    /// Persist an acknowledged view after reconciliation. Best-effort from
    /// the caller's perspective: failures are logged, not propagated.
    fn persist(&self, key: &DocumentKey, doc: &CachedDocument) -> Result<(), CacheError>;
}
