//! MutationTransport — the network collaborator contract.
//!
//! The transport accepts a batch and later invokes exactly one of the
//! client's `apply_ack` / `apply_rejection` entry points for it; it may also
//! push `apply_remote_change` events for writes from other clients at any
//! time. Retry and backoff for transient failures are the transport's
//! responsibility — this core only distinguishes terminal rejection from
//! "not yet acknowledged".

use async_trait::async_trait;

use crate::mutation::types::MutationBatch;

/// User-implemented network layer (HTTP, WebSocket, etc.).
#[async_trait]
pub trait MutationTransport: Send + Sync {
    /// Hand off a batch for delivery. Returning `Ok(())` means the transport
    /// has taken ownership of eventually producing an ack or rejection.
    async fn submit(&self, batch: &MutationBatch) -> Result<(), TransportError>;
}

/// Classification of transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Retriable (network, temporary failures). The batch stays queued.
    Transient,
    /// Not retriable. The batch is rejected immediately.
    Permanent,
}

/// Transport-level error (wraps arbitrary error strings from the network
/// layer).
#[derive(Debug, Clone)]
pub struct TransportError {
    pub message: String,
    pub kind: TransportErrorKind,
}

impl TransportError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TransportErrorKind::Transient,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TransportErrorKind::Permanent,
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}
