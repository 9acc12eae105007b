//! ViewEvent — what listeners receive when a document's view changes.

use crate::types::DocumentSnapshot;

/// Where a view change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    /// The optimistic view immediately after a write on this client was
    /// enqueued.
    Local,
    /// The view after the server spoke: an acknowledgement or rejection of
    /// this client's write, or another client's change arriving through the
    /// sync channel.
    Remote,
}

/// A snapshot delivered to a listener.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewEvent {
    pub snapshot: DocumentSnapshot,
    pub origin: EventOrigin,
}
