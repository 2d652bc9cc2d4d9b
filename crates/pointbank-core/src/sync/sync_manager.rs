//! Sync manager: mode selection, queue draining and pull-and-merge.
//!
//! Mode transitions:
//!
//! ```text
//! Offline ──initialize──▶ HybridIdle | LocalOnly
//! LocalOnly ──connectivity restored + healthy──▶ HybridIdle
//! Hybrid* ──connectivity lost──▶ LocalOnly
//! HybridIdle ──sync──▶ HybridSyncing ──pass done──▶ HybridIdle
//! ```
//!
//! The `draining` flag is the drain gate: at most one pass runs at a time,
//! even when connectivity flips while it runs.
//! Every remote call is bounded by the configured timeout.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::calendar::Clock;
use crate::error::{PersistenceError, RemoteError};
use crate::model::{PointRecord, TimeUsageRecord};
use crate::storage::record_store::StoredRecord;
use crate::storage::RecordStore;
use crate::sync::connectivity::ConnectivityProbe;
use crate::sync::remote::{with_field, RemoteAdapter, RemoteCollection};
use crate::sync::sync_queue::SyncQueue;
use crate::sync::types::{
    SkipReason, SyncContext, SyncIntent, SyncMode, SyncOutcome, SyncReport, SyncStatus, SyncTarget,
};

pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Releases the drain gate when a pass ends, including when its future is
/// dropped mid-flight.
struct DrainGate<'a> {
    context: &'a Mutex<SyncContext>,
}

impl Drop for DrainGate<'_> {
    fn drop(&mut self) {
        let mut ctx = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        ctx.draining = false;
        if ctx.mode == SyncMode::HybridSyncing {
            ctx.mode = SyncMode::HybridIdle;
        }
    }
}

/// Orchestrates connectivity, the intent queue and the remote adapter.
pub struct SyncManager {
    store: Arc<RecordStore>,
    remote: Arc<dyn RemoteAdapter>,
    probe: Arc<dyn ConnectivityProbe>,
    clock: Arc<dyn Clock>,
    owner_id: String,
    timeout: Duration,
    queue: Mutex<SyncQueue>,
    context: Mutex<SyncContext>,
}

impl SyncManager {
    /// Create a manager in `Offline` mode, loading any persisted queue.
    pub fn new(
        store: Arc<RecordStore>,
        remote: Arc<dyn RemoteAdapter>,
        probe: Arc<dyn ConnectivityProbe>,
        clock: Arc<dyn Clock>,
        owner_id: impl Into<String>,
    ) -> Result<Self, PersistenceError> {
        let queue = SyncQueue::load(&store)?;
        Ok(Self {
            store,
            remote,
            probe,
            clock,
            owner_id: owner_id.into(),
            timeout: DEFAULT_REMOTE_TIMEOUT,
            queue: Mutex::new(queue),
            context: Mutex::new(SyncContext::default()),
        })
    }

    /// Bound applied to every remote call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn lock_context(&self) -> MutexGuard<'_, SyncContext> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_queue(&self) -> MutexGuard<'_, SyncQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn context(&self) -> SyncContext {
        *self.lock_context()
    }

    pub fn mode(&self) -> SyncMode {
        self.lock_context().mode
    }

    fn set_mode(&self, mode: SyncMode) {
        let mut ctx = self.lock_context();
        if ctx.mode != mode {
            info!(from = %ctx.mode, to = %mode, "sync mode changed");
            ctx.mode = mode;
        }
    }

    /// Run `call` under the remote timeout.
    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout {
                operation: operation.to_string(),
                limit: self.timeout,
            }),
        }
    }

    async fn remote_is_healthy(&self) -> bool {
        tokio::time::timeout(self.timeout, self.remote.probe_health())
            .await
            .unwrap_or(false)
    }

    /// Probe connectivity and remote health; pick a mode.
    async fn probe_mode(&self) -> SyncMode {
        let online = self.probe.is_online().await;
        let healthy = online && self.remote_is_healthy().await;
        let mode = if healthy {
            SyncMode::HybridIdle
        } else {
            SyncMode::LocalOnly
        };
        {
            let mut ctx = self.lock_context();
            ctx.online = online;
            ctx.remote_healthy = healthy;
        }
        self.set_mode(mode);
        mode
    }

    /// Resolve the initial mode and, when hybrid, drain whatever was left
    /// queued by a previous session.
    pub async fn initialize(&self) -> SyncMode {
        let mode = self.probe_mode().await;
        if mode == SyncMode::HybridIdle {
            self.sync().await;
        }
        info!(mode = %mode, pending = self.pending_count(), "sync manager initialized");
        mode
    }

    /// Connectivity came back. Only `LocalOnly` re-probes; hybrid modes stay.
    pub async fn on_connectivity_restored(&self) -> SyncMode {
        let current = {
            let mut ctx = self.lock_context();
            ctx.online = true;
            ctx.mode
        };
        if current != SyncMode::LocalOnly {
            return current;
        }

        let healthy = self.remote_is_healthy().await;
        self.lock_context().remote_healthy = healthy;
        if !healthy {
            debug!("remote still unhealthy, staying local-only");
            return SyncMode::LocalOnly;
        }

        // Connectivity may have dropped again while probing. A pass that
        // outlived the outage keeps the gate; it is reported as syncing.
        let mode = {
            let mut ctx = self.lock_context();
            if ctx.online && ctx.mode == SyncMode::LocalOnly {
                let next = if ctx.draining {
                    SyncMode::HybridSyncing
                } else {
                    SyncMode::HybridIdle
                };
                info!(from = %SyncMode::LocalOnly, to = %next, "sync mode changed");
                ctx.mode = next;
            }
            ctx.mode
        };
        if mode == SyncMode::HybridIdle {
            self.sync().await;
        }
        mode
    }

    /// Connectivity dropped. A pass already in flight finishes; no new pass
    /// starts until connectivity is restored.
    pub fn on_connectivity_lost(&self) {
        let mut ctx = self.lock_context();
        ctx.online = false;
        if ctx.mode.is_hybrid() {
            info!(from = %ctx.mode, to = %SyncMode::LocalOnly, "sync mode changed");
            ctx.mode = SyncMode::LocalOnly;
        }
    }

    /// Queue one intent and persist the queue.
    pub fn enqueue(&self, intent: SyncIntent) -> Result<(), PersistenceError> {
        let mut queue = self.lock_queue();
        if queue.enqueue(intent) {
            queue.persist(&self.store)?;
        }
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.lock_queue().len()
    }

    /// Intents currently queued, oldest first.
    pub fn pending(&self) -> Vec<SyncIntent> {
        self.lock_queue().snapshot()
    }

    /// Whether a write should trigger a drain right now.
    pub fn can_sync(&self) -> bool {
        let ctx = self.context();
        ctx.online && ctx.mode == SyncMode::HybridIdle && !ctx.draining
    }

    /// Drain the queue once.
    ///
    /// Intents are attempted in FIFO order. A failed intent stays queued and
    /// the pass moves on, so a later intent can land remotely before an
    /// earlier one. Intents enqueued during the pass wait for the next one.
    pub async fn sync(&self) -> SyncOutcome {
        {
            let mut ctx = self.lock_context();
            if ctx.draining {
                debug!("sync already in progress");
                return SyncOutcome::Skipped {
                    reason: SkipReason::AlreadySyncing,
                    mode: ctx.mode,
                };
            }
            if !(ctx.online && ctx.mode == SyncMode::HybridIdle) {
                return SyncOutcome::Skipped {
                    reason: SkipReason::Unavailable,
                    mode: ctx.mode,
                };
            }
            ctx.draining = true;
            ctx.mode = SyncMode::HybridSyncing;
        }
        let _gate = DrainGate {
            context: &self.context,
        };

        let batch = self.lock_queue().snapshot();
        let mut report = SyncReport::default();
        for intent in batch {
            match self.apply(&intent).await {
                Ok(()) => {
                    self.lock_queue().remove(&intent.id);
                    debug!(id = %intent.id, target = ?intent.target, "intent applied");
                    report.applied.push(intent.id);
                }
                Err(err) => {
                    warn!(id = %intent.id, target = ?intent.target, error = %err, "intent retained");
                    report.retained.push(intent.id);
                }
            }
        }

        let persisted = {
            let queue = self.lock_queue();
            queue.persist(&self.store)
        };
        if let Err(err) = persisted {
            warn!(error = %err, "failed to persist sync queue");
        }
        if let Err(err) = self.store.set_last_sync_at(self.clock.now()) {
            warn!(error = %err, "failed to record sync time");
        }

        info!(
            applied = report.applied.len(),
            retained = report.retained.len(),
            "sync pass complete"
        );
        SyncOutcome::Completed(report)
    }

    async fn apply(&self, intent: &SyncIntent) -> Result<(), RemoteError> {
        let owner = self.owner_id.as_str();
        match intent.target {
            SyncTarget::PointRecord => self
                .bounded(
                    "create point record",
                    self.remote
                        .create(RemoteCollection::PointRecords, intent.payload.clone(), owner),
                )
                .await
                .map(drop),
            SyncTarget::TimeRecord => self
                .bounded(
                    "create time record",
                    self.remote
                        .create(RemoteCollection::TimeRecords, intent.payload.clone(), owner),
                )
                .await
                .map(drop),
            SyncTarget::RankingState | SyncTarget::Profile => {
                let profile = with_field(intent.payload.clone(), "id", owner);
                self.bounded("upsert profile", self.remote.upsert_profile(profile))
                    .await
                    .map(drop)
            }
        }
    }

    /// Pull both record collections and merge them into the local store.
    ///
    /// Only runs in hybrid mode. Remote failures fall back to the local view
    /// and are logged; local persistence failures are returned. Returns
    /// whether anything was merged.
    pub async fn refresh_view(&self) -> Result<bool, PersistenceError> {
        let ctx = self.context();
        if !(ctx.online && ctx.mode.is_hybrid()) {
            return Ok(false);
        }
        let points = self
            .pull::<PointRecord>(RemoteCollection::PointRecords)
            .await?;
        let times = self
            .pull::<TimeUsageRecord>(RemoteCollection::TimeRecords)
            .await?;
        Ok(points || times)
    }

    async fn pull<R: StoredRecord>(
        &self,
        collection: RemoteCollection,
    ) -> Result<bool, PersistenceError> {
        let rows = match self
            .bounded(
                "list records",
                self.remote.list(collection, &self.owner_id),
            )
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                warn!(table = collection.table(), error = %err, "pull failed, using local view");
                return Ok(false);
            }
        };

        let records: Vec<R> = rows.into_iter().filter_map(decode_row::<R>).collect();
        let merged = self.store.merge_all(records)?;
        debug!(table = collection.table(), total = merged.len(), "remote records merged");
        Ok(true)
    }

    pub fn status(&self) -> Result<SyncStatus, PersistenceError> {
        let ctx = self.context();
        Ok(SyncStatus {
            mode: ctx.mode,
            online: ctx.online,
            remote_healthy: ctx.remote_healthy,
            pending_count: self.pending_count(),
            in_progress: ctx.draining,
            last_sync_at: self.store.last_sync_at()?,
        })
    }

    /// Persist the queue and drop back to `Offline`.
    pub fn shutdown(&self) -> Result<(), PersistenceError> {
        self.lock_queue().persist(&self.store)?;
        let mut ctx = self.lock_context();
        *ctx = SyncContext {
            draining: ctx.draining,
            ..SyncContext::default()
        };
        info!("sync manager shut down");
        Ok(())
    }
}

fn decode_row<R: StoredRecord>(row: Value) -> Option<R> {
    match serde_json::from_value(row) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(key = %R::KEY, error = %err, "skipping malformed remote row");
            None
        }
    }
}
