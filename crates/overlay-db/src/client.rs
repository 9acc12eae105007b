//! OverlayClient — ties the queue, applier, reconciler, and listener layer
//! together behind per-document serialization points.
//!
//! # Threading model
//!
//! All queue mutation, reconciliation, and view recomputation for a given
//! document runs under that document's slot lock, created lazily in a keyed
//! lock map and released again once the document has no queued mutations and
//! no listeners. Different documents proceed independently. Lock order when
//! nesting is always slot → queue; the listener registry and the pending-ack
//! map use their own locks and are never held across callbacks.
//!
//! Listener callbacks run while the document's slot lock is held (that is
//! what makes the local-then-remote ordering observable), so a callback must
//! not synchronously re-enter the client for the same document. Unsubscribing
//! from inside a callback is explicitly supported.
//!
//! Nothing here blocks on network I/O: `write` awaits only the transport's
//! hand-off, outside every lock, and acknowledgements arrive later through
//! the `apply_*` entry points.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::apply::{self, FieldError};
use crate::error::{CacheError, OverlayDbError, Result, WriteError};
use crate::listen::{EventOrigin, ListenerMultiplexer, Unsubscribe, ViewEvent};
use crate::model::value::ObjectValue;
use crate::mutation::queue::MutationQueue;
use crate::mutation::types::{BatchId, Mutation, MutationBatch, MutationResult};
use crate::reconcile::{self, AckVersion, DocumentState, ReconcileOutcome};
use crate::store::traits::{CachedDocument, DocumentCache};
use crate::transport::{MutationTransport, TransportErrorKind};
use crate::types::{DocumentKey, DocumentSnapshot};

// ============================================================================
// Options and write handles
// ============================================================================

/// Configuration for [`OverlayClient`].
pub struct ClientOptions {
    pub transport: Arc<dyn MutationTransport>,
    pub cache: Arc<dyn DocumentCache>,
}

/// Terminal outcome of a write, delivered to the originating caller only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAck {
    Acknowledged { version: i64 },
    Rejected { reason: String },
}

/// Returned from [`OverlayClient::write`].
///
/// `transform_errors` carries any `TypeMismatch` hit while computing the
/// optimistic local estimate for this write; the affected fields kept their
/// pre-transform values and the write still proceeded. `ack` resolves exactly
/// once with the terminal outcome.
#[derive(Debug)]
pub struct WriteHandle {
    pub batch_id: BatchId,
    pub transform_errors: Vec<FieldError>,
    pub ack: oneshot::Receiver<WriteAck>,
}

impl WriteHandle {
    /// Await the terminal outcome.
    pub async fn wait(self) -> Result<WriteAck> {
        self.ack
            .await
            .map_err(|_| OverlayDbError::Internal("client dropped before resolving write".into()))
    }
}

// ============================================================================
// OverlayClient
// ============================================================================

struct DocumentSlot {
    /// `None` until the base has been loaded from the cache.
    state: Option<DocumentState>,
}

/// The reconciliation core. Cheap to share behind an `Arc`.
pub struct OverlayClient {
    transport: Arc<dyn MutationTransport>,
    cache: Arc<dyn DocumentCache>,
    queue: Arc<Mutex<MutationQueue>>,
    /// Per-document serialization points, created lazily and released by
    /// [`Self::maybe_gc`].
    slots: Arc<Mutex<HashMap<DocumentKey, Arc<Mutex<DocumentSlot>>>>>,
    listeners: Arc<ListenerMultiplexer>,
    /// Originator channels for in-flight batches.
    pending_acks: Mutex<HashMap<BatchId, oneshot::Sender<WriteAck>>>,
    next_batch_id: AtomicI64,
    next_mutation_id: AtomicI64,
    closed: AtomicBool,
}

impl OverlayClient {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            transport: options.transport,
            cache: options.cache,
            queue: Arc::new(Mutex::new(MutationQueue::new())),
            slots: Arc::new(Mutex::new(HashMap::new())),
            listeners: Arc::new(ListenerMultiplexer::new()),
            pending_acks: Mutex::new(HashMap::new()),
            next_batch_id: AtomicI64::new(1),
            next_mutation_id: AtomicI64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    // -----------------------------------------------------------------------
    // Public API — writes and reads
    // -----------------------------------------------------------------------

    /// Enqueue `mutations` as one atomically-acknowledged batch.
    ///
    /// The local view is recomputed and the `Local` event delivered before
    /// the batch is handed to the transport. A `Permanent` transport failure
    /// rejects the batch immediately; a `Transient` one leaves it queued for
    /// the transport's retry machinery.
    pub async fn write(&self, mutations: Vec<Mutation>) -> Result<WriteHandle> {
        self.ensure_open()?;
        if mutations.is_empty() {
            return Err(WriteError::EmptyWrite.into());
        }

        let batch_id = BatchId(self.next_batch_id.fetch_add(1, Ordering::Relaxed));
        let mut batch = MutationBatch { batch_id, mutations };
        for mutation in &mut batch.mutations {
            mutation.mutation_id = self.next_mutation_id.fetch_add(1, Ordering::Relaxed);
        }
        let keys = batch.affected_keys();

        // Load bases up front so nothing can fail between enqueue and the
        // local events.
        for key in &keys {
            self.with_state(key, |_| ())?;
        }

        self.queue.lock().enqueue(batch.clone());

        let mut transform_errors = Vec::new();
        for key in &keys {
            let errors = self.with_state(key, |state| {
                let (snapshot, errors) = self.view_of(key, state);
                self.listeners.publish(key, snapshot, EventOrigin::Local);
                errors
            })?;
            // Only this batch's own estimate failures go to its originator.
            transform_errors.extend(
                errors
                    .into_iter()
                    .filter(|(id, _)| batch.mutations.iter().any(|m| m.mutation_id == *id))
                    .map(|(_, error)| error),
            );
        }

        let (sender, receiver) = oneshot::channel();
        self.pending_acks.lock().insert(batch_id, sender);

        match self.transport.submit(&batch).await {
            Ok(()) => {}
            Err(error) => match error.kind {
                TransportErrorKind::Permanent => {
                    self.finish_rejected(batch_id, error.message);
                }
                TransportErrorKind::Transient => {
                    tracing::warn!(%batch_id, error = %error, "transport submit failed; batch remains queued");
                }
            },
        }

        Ok(WriteHandle {
            batch_id,
            transform_errors,
            ack: receiver,
        })
    }

    /// The current local view: acknowledged base folded with every queued
    /// mutation. Instant, no I/O beyond a lazy cache load.
    pub fn snapshot(&self, key: &DocumentKey) -> Result<DocumentSnapshot> {
        self.ensure_open()?;
        let snapshot = self.with_state(key, |state| self.view_of(key, state).0)?;
        self.maybe_gc(key);
        Ok(snapshot)
    }

    pub fn has_pending_writes(&self, key: &DocumentKey) -> bool {
        self.queue.lock().has_pending(key)
    }

    /// Subscribe to view changes for one document.
    ///
    /// One snapshot representing current knowledge (or nonexistence) is
    /// delivered before this returns. After that, each write through this
    /// client yields a `Local` then a `Remote` event in strict order, and
    /// changes arriving from elsewhere yield a single `Remote` event.
    /// Identical recomputed views are suppressed.
    pub fn listen(
        &self,
        key: &DocumentKey,
        callback: impl Fn(&ViewEvent) + Send + Sync + 'static,
    ) -> Result<Unsubscribe> {
        self.ensure_open()?;
        let inner = self.with_state(key, |state| {
            let (snapshot, _) = self.view_of(key, state);
            self.listeners
                .subscribe(key.clone(), Box::new(callback), snapshot)
        })?;

        let listeners = Arc::clone(&self.listeners);
        let queue = Arc::clone(&self.queue);
        let slots = Arc::clone(&self.slots);
        let key = key.clone();
        Ok(Box::new(move || {
            inner();
            if !listeners.has_listeners(&key) && !queue.lock().has_pending(&key) {
                if slots.lock().remove(&key).is_some() {
                    tracing::debug!(key = %key, "document state released");
                }
            }
        }))
    }

    // -----------------------------------------------------------------------
    // Network-facing entry points
    // -----------------------------------------------------------------------

    /// The server acknowledged `batch_id`: apply literal writes and the
    /// concrete transform results to the acknowledged views, bump versions,
    /// retire the batch, recompute remaining local views, emit the `Remote`
    /// leg, and resolve the originator's handle.
    ///
    /// `results` pairs positionally with the batch's mutations. Duplicate or
    /// unknown acks are logged and treated as success.
    pub fn apply_ack(
        &self,
        batch_id: BatchId,
        results: Vec<MutationResult>,
        version: i64,
    ) -> Result<()> {
        self.ensure_open()?;
        let batch = match self.queue.lock().batch(batch_id).cloned() {
            Some(batch) => batch,
            None => {
                tracing::warn!(%batch_id, "ack for unknown or already-retired batch");
                self.resolve(batch_id, WriteAck::Acknowledged { version });
                return Ok(());
            }
        };
        if results.len() != batch.mutations.len() {
            tracing::warn!(
                %batch_id,
                expected = batch.mutations.len(),
                got = results.len(),
                "ack result count mismatch; pairing by position"
            );
        }

        let empty = MutationResult::default();
        for key in batch.affected_keys() {
            let mut key_mutations: Vec<&Mutation> = Vec::new();
            let mut key_results: Vec<&MutationResult> = Vec::new();
            for (index, mutation) in batch.mutations.iter().enumerate() {
                if mutation.key == key {
                    key_mutations.push(mutation);
                    key_results.push(results.get(index).unwrap_or(&empty));
                }
            }

            self.with_state(&key, |state| {
                match reconcile::acknowledge(state, &key_mutations, &key_results, version) {
                    AckVersion::Advanced => {}
                    AckVersion::HeldBack { incoming, current } => {
                        tracing::warn!(key = %key, incoming, current, "stale ack; writes applied, version held");
                    }
                }
                self.persist_state(&key, state);
            })?;
        }

        if self.queue.lock().retire(batch_id).is_none() {
            tracing::warn!(%batch_id, "batch already retired");
        }

        for key in batch.affected_keys() {
            self.with_state(&key, |state| {
                let (snapshot, _) = self.view_of(&key, state);
                self.listeners.publish(&key, snapshot, EventOrigin::Remote);
            })?;
            self.maybe_gc(&key);
        }

        self.resolve(batch_id, WriteAck::Acknowledged { version });
        Ok(())
    }

    /// The server rejected `batch_id` (or the transport failed permanently):
    /// retire the batch without applying its writes, recompute so the
    /// optimistic effect disappears, and surface the reason to the
    /// originating caller only.
    pub fn apply_rejection(&self, batch_id: BatchId, reason: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.finish_rejected(batch_id, reason.into());
        Ok(())
    }

    /// An unsolicited change from another client arrived through the sync
    /// channel. Delivered to listeners as a single `Remote` event; versions
    /// are monotonic per document and stale changes are ignored.
    pub fn apply_remote_change(
        &self,
        key: &DocumentKey,
        data: Option<ObjectValue>,
        version: i64,
    ) -> Result<()> {
        self.ensure_open()?;
        self.with_state(key, |state| {
            match reconcile::remote_change(state, data, version) {
                ReconcileOutcome::Applied => {
                    self.persist_state(key, state);
                    let (snapshot, _) = self.view_of(key, state);
                    self.listeners.publish(key, snapshot, EventOrigin::Remote);
                }
                ReconcileOutcome::Stale { incoming, current } => {
                    tracing::warn!(key = %key, incoming, current, "stale remote change ignored");
                }
            }
        })?;
        self.maybe_gc(key);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Tear down: no further writes, reads, or deliveries. In-flight write
    /// handles resolve as rejected. Safe to call more than once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.listeners.clear();
        let senders: Vec<(BatchId, oneshot::Sender<WriteAck>)> =
            self.pending_acks.lock().drain().collect();
        for (_, sender) in senders {
            let _ = sender.send(WriteAck::Rejected {
                reason: "client is closed".to_string(),
            });
        }
        tracing::debug!("overlay client closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(OverlayDbError::ClientClosed)
        } else {
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// Run `f` under `key`'s serialization point, lazily loading the
    /// acknowledged base from the cache on first touch.
    fn with_state<R>(&self, key: &DocumentKey, f: impl FnOnce(&mut DocumentState) -> R) -> Result<R> {
        let slot = {
            let mut slots = self.slots.lock();
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(DocumentSlot { state: None })))
                .clone()
        };
        let mut guard = slot.lock();
        if guard.state.is_none() {
            let state = match self.cache.load(key)? {
                Some(cached) => {
                    let data = match cached.data {
                        None => None,
                        Some(json) => Some(serde_json::from_value(json).map_err(|source| {
                            CacheError::Corrupt {
                                key: key.to_string(),
                                source,
                            }
                        })?),
                    };
                    DocumentState::new(data, cached.version)
                }
                None => DocumentState::missing(),
            };
            guard.state = Some(state);
        }
        match guard.state.as_mut() {
            Some(state) => Ok(f(state)),
            None => Err(OverlayDbError::Internal(
                "document state vanished under its own lock".into(),
            )),
        }
    }

    /// Compute the local view for `key` over its acknowledged state.
    /// Must be called while holding `key`'s slot lock (slot → queue order).
    fn view_of(
        &self,
        key: &DocumentKey,
        state: &DocumentState,
    ) -> (DocumentSnapshot, Vec<(i64, FieldError)>) {
        let pending = self.queue.lock().mutations_for(key);
        let fold = apply::fold_local(state.data.as_ref(), state.version, &pending);
        (
            DocumentSnapshot {
                key: key.clone(),
                data: fold.data,
                version: state.version,
                has_pending_writes: !pending.is_empty(),
                is_from_cache: !state.synced,
            },
            fold.transform_errors,
        )
    }

    fn finish_rejected(&self, batch_id: BatchId, reason: String) {
        let retired = self.queue.lock().retire(batch_id);
        match retired {
            None => {
                tracing::warn!(%batch_id, "rejection for unknown or already-retired batch");
            }
            Some(batch) => {
                for key in batch.affected_keys() {
                    let recomputed = self.with_state(&key, |state| {
                        let (snapshot, _) = self.view_of(&key, state);
                        self.listeners.publish(&key, snapshot, EventOrigin::Remote);
                    });
                    if let Err(error) = recomputed {
                        tracing::warn!(key = %key, error = %error, "failed to recompute view after rejection");
                    }
                    self.maybe_gc(&key);
                }
            }
        }
        self.resolve(batch_id, WriteAck::Rejected { reason });
    }

    fn persist_state(&self, key: &DocumentKey, state: &DocumentState) {
        let data = match &state.data {
            None => None,
            Some(object) => match serde_json::to_value(object) {
                Ok(value) => Some(value),
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "failed to serialize acknowledged view; skipping persist");
                    return;
                }
            },
        };
        let doc = CachedDocument {
            data,
            version: state.version,
        };
        // Best-effort persist — log failures so operators can detect a sick
        // cache; the in-memory acknowledged view stays authoritative.
        if let Err(error) = self.cache.persist(key, &doc) {
            tracing::warn!(key = %key, error = %error, "failed to persist acknowledged view");
        }
    }

    fn resolve(&self, batch_id: BatchId, ack: WriteAck) {
        if let Some(sender) = self.pending_acks.lock().remove(&batch_id) {
            let _ = sender.send(ack);
        }
    }

    /// Release a document's in-memory state once nothing references it. The
    /// acknowledged view survives in the cache and is lazily reloaded.
    fn maybe_gc(&self, key: &DocumentKey) {
        if self.listeners.has_listeners(key) || self.queue.lock().has_pending(key) {
            return;
        }
        if self.slots.lock().remove(key).is_some() {
            tracing::debug!(key = %key, "document state released");
        }
    }
}
