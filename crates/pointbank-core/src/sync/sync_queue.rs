//! Durable FIFO queue of pending sync intents.

use tracing::debug;

use crate::error::PersistenceError;
use crate::storage::RecordStore;
use crate::sync::types::SyncIntent;

/// Ordered list of intents awaiting remote application.
///
/// Persisted through the record store under the sync-queue key.
#[derive(Debug, Default, Clone)]
pub struct SyncQueue {
    pending: Vec<SyncIntent>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the persisted queue, oldest intent first.
    pub fn load(store: &RecordStore) -> Result<Self, PersistenceError> {
        let mut queue = Self::new();
        for intent in store.sync_queue()? {
            queue.enqueue(intent);
        }
        // Stable sort keeps insertion order among equal timestamps.
        queue.pending.sort_by_key(|intent| intent.enqueued_at);
        Ok(queue)
    }

    /// Append an intent. Returns `false` if an intent with the same id is
    /// already queued.
    pub fn enqueue(&mut self, intent: SyncIntent) -> bool {
        if self.contains(&intent.id) {
            debug!(id = %intent.id, "duplicate intent ignored");
            return false;
        }
        debug!(id = %intent.id, target = ?intent.target, "intent queued");
        self.pending.push(intent);
        true
    }

    /// Copy of the current queue in FIFO order.
    pub fn snapshot(&self) -> Vec<SyncIntent> {
        self.pending.clone()
    }

    /// Drop one intent by id.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.pending.len();
        self.pending.retain(|intent| intent.id != id);
        before != self.pending.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.iter().any(|intent| intent.id == id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncIntent> {
        self.pending.iter()
    }

    /// Write the queue back through the record store.
    pub fn persist(&self, store: &RecordStore) -> Result<(), PersistenceError> {
        store.save_sync_queue(&self.pending)
    }
}
