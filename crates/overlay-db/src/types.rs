use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::value::ObjectValue;

/// Identity of a document: its collection name plus record id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentKey {
    pub collection: String,
    pub id: String,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// An immutable view of a document at a point in time.
///
/// `data == None` means the document does not exist. Two views exist
/// conceptually per document: the local view (acknowledged base folded with
/// every queued mutation) and the acknowledged view (server-confirmed state
/// only). Both are materialized as snapshots; snapshots are never mutated in
/// place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSnapshot {
    pub key: DocumentKey,
    pub data: Option<ObjectValue>,
    /// Last server-assigned version, `0` if the document has never been
    /// acknowledged.
    pub version: i64,
    /// True if at least one unacknowledged mutation is folded into `data`.
    pub has_pending_writes: bool,
    /// True until the document has observed any server-assigned version.
    pub is_from_cache: bool,
}

impl DocumentSnapshot {
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Listener-visible equality: data plus the pending/cache flags.
    ///
    /// The version is deliberately excluded — a remote change that alters no
    /// field and no flag is suppressed even though it advanced the version.
    pub fn same_view(&self, other: &DocumentSnapshot) -> bool {
        self.data == other.data
            && self.has_pending_writes == other.has_pending_writes
            && self.is_from_cache == other.is_from_cache
    }
}
