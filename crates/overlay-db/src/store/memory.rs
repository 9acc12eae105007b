//! In-memory DocumentCache, the reference implementation used by tests and
//! by clients that opt out of durable caching.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::CacheError;
use crate::types::DocumentKey;

use super::traits::{CachedDocument, DocumentCache};

/// HashMap-backed cache. Cheap clones of stored documents on load.
#[derive(Default)]
pub struct MemoryCache {
    documents: Mutex<HashMap<DocumentKey, CachedDocument>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached documents (tombstones included).
    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }
}

impl DocumentCache for MemoryCache {
    fn load(&self, key: &DocumentKey) -> Result<Option<CachedDocument>, CacheError> {
        Ok(self.documents.lock().get(key).cloned())
    }

    fn persist(&self, key: &DocumentKey, doc: &CachedDocument) -> Result<(), CacheError> {
        self.documents.lock().insert(key.clone(), doc.clone());
        Ok(())
    }
}
