//! MutationQueue — ordered, in-memory list of batches awaiting server
//! acknowledgement.
//!
//! Batches stay in enqueue order; mutations for a given document fold in
//! mutation-id order regardless of batch boundaries, so retiring a middle
//! batch never disturbs the relative order of the rest.

use crate::mutation::types::{BatchId, Mutation, MutationBatch};
use crate::types::DocumentKey;

/// The pending-write queue. Not internally synchronized — the owning client
/// guards it with its own lock.
#[derive(Debug, Default)]
pub struct MutationQueue {
    batches: Vec<MutationBatch>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self { batches: Vec::new() }
    }

    /// Append a batch. Batch ids are assigned monotonically by the client, so
    /// vector order is enqueue order.
    pub fn enqueue(&mut self, batch: MutationBatch) {
        debug_assert!(
            self.batches
                .last()
                .map(|b| b.batch_id < batch.batch_id)
                .unwrap_or(true),
            "batch ids must be enqueued in increasing order"
        );
        self.batches.push(batch);
    }

    /// Look up a still-queued batch.
    pub fn batch(&self, batch_id: BatchId) -> Option<&MutationBatch> {
        self.batches.iter().find(|b| b.batch_id == batch_id)
    }

    /// Remove a batch and return it. `None` means the id is unknown or
    /// already retired — callers treat that as success (duplicate acks are
    /// tolerated) and log it.
    pub fn retire(&mut self, batch_id: BatchId) -> Option<MutationBatch> {
        let index = self.batches.iter().position(|b| b.batch_id == batch_id)?;
        Some(self.batches.remove(index))
    }

    /// All queued mutations for `key`, cloned, in enqueue order.
    pub fn mutations_for(&self, key: &DocumentKey) -> Vec<Mutation> {
        self.batches
            .iter()
            .flat_map(|b| b.mutations.iter())
            .filter(|m| &m.key == key)
            .cloned()
            .collect()
    }

    pub fn has_pending(&self, key: &DocumentKey) -> bool {
        self.batches
            .iter()
            .any(|b| b.mutations.iter().any(|m| &m.key == key))
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }
}
