//! SQLite-backed DocumentCache using rusqlite (bundled).
//!
//! The connection is protected by a `parking_lot::ReentrantMutex<RefCell<..>>`
//! so a future transactional wrapper can hold the lock while individual
//! statements re-acquire it. Document data is stored as JSON text; a NULL
//! `data` column records a tombstone (nonexistence at a version).

use std::cell::RefCell;
use std::path::Path;

use parking_lot::ReentrantMutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::CacheError;
use crate::types::DocumentKey;

use super::traits::{CachedDocument, DocumentCache};

/// Durable document cache.
pub struct SqliteCache {
    conn: ReentrantMutex<RefCell<Connection>>,
}

impl SqliteCache {
    /// Open a file-backed cache, creating the schema if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory cache (useful for tests).
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;

             CREATE TABLE IF NOT EXISTS documents (
                 collection  TEXT NOT NULL,
                 id          TEXT NOT NULL,
                 data        TEXT,
                 version     INTEGER NOT NULL DEFAULT 0,
                 PRIMARY KEY (collection, id)
             );",
        )?;
        Ok(Self {
            conn: ReentrantMutex::new(RefCell::new(conn)),
        })
    }
}

impl DocumentCache for SqliteCache {
    fn load(&self, key: &DocumentKey) -> Result<Option<CachedDocument>, CacheError> {
        let guard = self.conn.lock();
        let conn = guard.borrow();
        let row: Option<(Option<String>, i64)> = conn
            .prepare_cached(
                "SELECT data, version FROM documents WHERE collection = ?1 AND id = ?2",
            )?
            .query_row(params![key.collection, key.id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;

        match row {
            None => Ok(None),
            Some((text, version)) => {
                let data = match text {
                    None => None,
                    Some(text) => Some(serde_json::from_str(&text).map_err(|source| {
                        CacheError::Corrupt {
                            key: key.to_string(),
                            source,
                        }
                    })?),
                };
                Ok(Some(CachedDocument { data, version }))
            }
        }
    }

    fn persist(&self, key: &DocumentKey, doc: &CachedDocument) -> Result<(), CacheError> {
        let text = match &doc.data {
            None => None,
            Some(value) => Some(value.to_string()),
        };
        let guard = self.conn.lock();
        let conn = guard.borrow();
        conn.prepare_cached(
            "INSERT OR REPLACE INTO documents (collection, id, data, version) \
             VALUES (?1, ?2, ?3, ?4)",
        )?
        .execute(params![key.collection, key.id, text, doc.version])?;
        Ok(())
    }
}
