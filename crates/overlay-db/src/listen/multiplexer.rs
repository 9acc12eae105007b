//! ListenerMultiplexer — per-document snapshot listener registry with diff
//! suppression and a strict delivery contract.
//!
//! Each listener is delivered one initial snapshot at subscribe time and then
//! only actual changes: a recomputed view structurally identical to the last
//! one delivered to that listener (data and pending/cache flags) is
//! suppressed.
//!
//! Delivery and unsubscription are serialized per listener through a
//! `ReentrantMutex`, which gives the two guarantees callers rely on:
//! calling the unsubscribe closure from inside a delivered callback is safe
//! (same thread re-enters the gate), and once unsubscribe returns from any
//! other thread, no further delivery can be in flight for that listener.
//!
//! Callbacks run with no registry lock held, so a callback may subscribe or
//! unsubscribe other listeners freely. Panics inside a callback are caught;
//! a misbehaving listener never breaks delivery to the rest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

use crate::types::{DocumentKey, DocumentSnapshot};

use super::event::{EventOrigin, ViewEvent};

/// Closure type for snapshot listeners.
pub type ListenerFn = dyn Fn(&ViewEvent) + Send + Sync;

/// An owned one-shot closure that removes a subscription when called.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

struct ListenerEntry {
    id: u64,
    active: AtomicBool,
    /// Serializes delivery against unsubscription for this listener.
    gate: ReentrantMutex<()>,
    last_delivered: Mutex<Option<DocumentSnapshot>>,
    callback: Box<ListenerFn>,
}

impl ListenerEntry {
    /// Deliver `event` if the listener is still active and the view actually
    /// changed since the last delivery.
    fn deliver(&self, event: &ViewEvent) {
        let _gate = self.gate.lock();
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        {
            let mut last = self.last_delivered.lock();
            if let Some(previous) = last.as_ref() {
                if previous.same_view(&event.snapshot) {
                    return;
                }
            }
            *last = Some(event.snapshot.clone());
        }
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (self.callback)(event);
        }));
    }
}

/// Per-document listener registry.
///
/// The registry map lives behind an `Arc` so unsubscribe closures can carry
/// their own handle to it.
pub struct ListenerMultiplexer {
    listeners: Arc<Mutex<HashMap<DocumentKey, Vec<Arc<ListenerEntry>>>>>,
    next_id: AtomicU64,
}

impl ListenerMultiplexer {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` for `key` and synchronously deliver `initial` —
    /// the "first snapshot" contract: a listener never waits indefinitely for
    /// its first event, even if the document does not exist.
    ///
    /// The caller must hold the document's serialization point so the initial
    /// delivery cannot interleave with a concurrent publish for the same key.
    pub fn subscribe(
        &self,
        key: DocumentKey,
        callback: Box<ListenerFn>,
        initial: DocumentSnapshot,
    ) -> Unsubscribe {
        let entry = Arc::new(ListenerEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            gate: ReentrantMutex::new(()),
            last_delivered: Mutex::new(None),
            callback,
        });

        self.listeners
            .lock()
            .entry(key.clone())
            .or_default()
            .push(Arc::clone(&entry));

        entry.deliver(&ViewEvent {
            snapshot: initial,
            origin: EventOrigin::Remote,
        });

        let registry = Arc::clone(&self.listeners);
        let entry_id = entry.id;
        Box::new(move || {
            // Taking the gate first means any in-flight delivery on another
            // thread finishes before we return, and none can start after.
            {
                let _gate = entry.gate.lock();
                entry.active.store(false, Ordering::Release);
            }
            let mut listeners = registry.lock();
            if let Some(entries) = listeners.get_mut(&key) {
                entries.retain(|e| e.id != entry_id);
                if entries.is_empty() {
                    listeners.remove(&key);
                }
            }
        })
    }

    /// Deliver `snapshot` to every listener on `key`, skipping listeners for
    /// which it is not an actual change.
    pub fn publish(&self, key: &DocumentKey, snapshot: DocumentSnapshot, origin: EventOrigin) {
        // Snapshot Arc references under the lock, invoke outside it.
        let entries: Vec<Arc<ListenerEntry>> = {
            let listeners = self.listeners.lock();
            match listeners.get(key) {
                Some(entries) => entries.iter().map(Arc::clone).collect(),
                None => return,
            }
        };

        let event = ViewEvent { snapshot, origin };
        for entry in entries {
            entry.deliver(&event);
        }
    }

    pub fn has_listeners(&self, key: &DocumentKey) -> bool {
        self.listeners
            .lock()
            .get(key)
            .map(|entries| !entries.is_empty())
            .unwrap_or(false)
    }

    /// Deactivate and drop every listener. Used at client shutdown.
    pub fn clear(&self) {
        let drained: Vec<Arc<ListenerEntry>> = {
            let mut listeners = self.listeners.lock();
            listeners.drain().flat_map(|(_, entries)| entries).collect()
        };
        for entry in drained {
            let _gate = entry.gate.lock();
            entry.active.store(false, Ordering::Release);
        }
    }
}

impl Default for ListenerMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}
