//! overlay-db — the local mutation/transform reconciliation core of an
//! offline-first document database client.
//!
//! Applications read and write documents instantly against a local cache
//! while mutations queue in order, go to a server, and the server's
//! authoritative results are merged back in. Every write through a client
//! produces exactly two events for its listeners: an optimistic `Local`
//! snapshot at enqueue time, then a `Remote` snapshot once the server has
//! spoken. Changes from other clients arrive as single `Remote` events.
//!
//! Network transport and durable persistence are collaborators consumed
//! through the [`transport::MutationTransport`] and
//! [`store::DocumentCache`] traits.

pub mod apply;
pub mod client;
pub mod error;
pub mod listen;
pub mod model;
pub mod mutation;
pub mod reconcile;
pub mod store;
pub mod transport;
pub mod types;

pub use client::{ClientOptions, OverlayClient, WriteAck, WriteHandle};
pub use error::{CacheError, OverlayDbError, Result, TransformError, WriteError};
pub use listen::{EventOrigin, Unsubscribe, ViewEvent};
pub use model::{FieldPath, FieldValue, ObjectValue, TransformOperation};
pub use mutation::{
    BatchId, LiteralWrite, Mutation, MutationBatch, MutationKind, MutationQueue, MutationResult,
    Precondition,
};
pub use store::{CachedDocument, DocumentCache, MemoryCache};
#[cfg(feature = "sqlite")]
pub use store::SqliteCache;
pub use transport::{MutationTransport, TransportError, TransportErrorKind};
pub use types::{DocumentKey, DocumentSnapshot};
