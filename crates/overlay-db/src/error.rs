use thiserror::Error;

use crate::model::path::FieldPath;

// ---------------------------------------------------------------------------
// TransformError
// ---------------------------------------------------------------------------

/// A transform was applied to an incompatible concrete base type.
///
/// Never fatal to view computation: the affected field keeps its
/// pre-transform value and the error is reported out-of-band to the caller
/// that originated the write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("cannot apply {operation} at \"{path}\": base value is {base_type}")]
    TypeMismatch {
        path: FieldPath,
        operation: &'static str,
        base_type: &'static str,
    },
}

// ---------------------------------------------------------------------------
// WriteError
// ---------------------------------------------------------------------------

/// A malformed write call, rejected before anything is enqueued.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    #[error("path \"{0}\" carries both a literal value and a transform")]
    OverlappingPath(FieldPath),

    #[error("literal value at \"{0}\" contains an Unknown sentinel")]
    UnknownLiteral(FieldPath),

    #[error("increment delta must be an integer or double, got {0}")]
    NonNumericDelta(&'static str),

    #[error("a write must contain at least one mutation")]
    EmptyWrite,
}

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Failure in the local persistence collaborator.
///
/// The cache is a cache, not a source of truth: persist failures after
/// reconciliation are logged and swallowed, load failures fail only the
/// operation that needed the base document.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cached document for {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache backend error: {0}")]
    Backend(String),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

// ---------------------------------------------------------------------------
// OverlayDbError — top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OverlayDbError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("client is closed")]
    ClientClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias — the default error type is `OverlayDbError`.
pub type Result<T, E = OverlayDbError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
