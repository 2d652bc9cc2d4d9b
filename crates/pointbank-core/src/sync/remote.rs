//! Contract to the remote record service, plus an in-process implementation.
//!
//! Payloads travel as JSON objects in the same shape the record store
//! persists. The adapter attaches the owner identity on the way out.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteError;

/// Field carrying the owner identity on every remote row.
pub const OWNER_FIELD: &str = "student_id";

/// Remote collections holding per-owner records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCollection {
    PointRecords,
    TimeRecords,
}

impl RemoteCollection {
    pub fn table(&self) -> &'static str {
        match self {
            RemoteCollection::PointRecords => "point_records",
            RemoteCollection::TimeRecords => "time_records",
        }
    }
}

/// Remote record service.
///
/// Every call may suspend on network I/O. Implementations hold no sync state;
/// retries and timeouts belong to the caller.
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    /// Store one record for `owner_id`. Creating an id that already exists
    /// must behave as an upsert.
    async fn create(
        &self,
        collection: RemoteCollection,
        payload: Value,
        owner_id: &str,
    ) -> Result<Value, RemoteError>;

    /// All records of `owner_id` in a collection.
    async fn list(
        &self,
        collection: RemoteCollection,
        owner_id: &str,
    ) -> Result<Vec<Value>, RemoteError>;

    async fn update(
        &self,
        collection: RemoteCollection,
        id: &str,
        patch: Value,
    ) -> Result<Value, RemoteError>;

    async fn delete(&self, collection: RemoteCollection, id: &str) -> Result<(), RemoteError>;

    async fn get_profile(&self, owner_id: &str) -> Result<Option<Value>, RemoteError>;

    /// Insert or merge a profile row. The payload carries its own `id`.
    async fn upsert_profile(&self, payload: Value) -> Result<Value, RemoteError>;

    /// Read-only reachability check. Never fails; any error reads as `false`.
    async fn probe_health(&self) -> bool;
}

/// Set `field` on a JSON object payload. Non-objects pass through unchanged.
pub fn with_field(mut payload: Value, field: &str, value: &str) -> Value {
    if let Value::Object(map) = &mut payload {
        map.insert(field.to_string(), Value::String(value.to_string()));
    }
    payload
}

fn payload_id(payload: &Value) -> Result<String, RemoteError> {
    payload
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RemoteError::Rejected("payload has no string 'id'".into()))
}

fn merge_object(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(fields)) => existing.extend(fields),
        (target, patch) => *target = patch,
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: HashMap<RemoteCollection, BTreeMap<String, Value>>,
    profiles: BTreeMap<String, Value>,
    failing_ids: HashSet<String>,
    applied: Vec<String>,
    calls: usize,
}

/// In-process remote with failure injection.
///
/// Healthy by default. `set_failing(true)` makes every call fail like an
/// outage, `fail_record(id)` fails only writes of one id, and
/// `set_latency` delays every call (useful for timeout and overlap tests).
#[derive(Debug)]
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
    healthy: AtomicBool,
    failing: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            healthy: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            latency: Mutex::new(None),
        }
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_record(&self, id: &str) {
        self.state().failing_ids.insert(id.to_string());
    }

    pub fn heal_record(&self, id: &str) {
        self.state().failing_ids.remove(id);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Stored rows of one collection, ordered by id.
    pub fn rows(&self, collection: RemoteCollection) -> Vec<Value> {
        self.state()
            .rows
            .get(&collection)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn profile(&self, owner_id: &str) -> Option<Value> {
        self.state().profiles.get(owner_id).cloned()
    }

    /// Ids of successful writes, in the order they landed.
    pub fn applied_order(&self) -> Vec<String> {
        self.state().applied.clone()
    }

    /// Number of calls received, failed ones included.
    pub fn call_count(&self) -> usize {
        self.state().calls
    }

    /// Seed a row directly, as if written by another device.
    pub fn insert_row(&self, collection: RemoteCollection, row: Value) -> Result<(), RemoteError> {
        let id = payload_id(&row)?;
        self.state()
            .rows
            .entry(collection)
            .or_default()
            .insert(id, row);
        Ok(())
    }

    /// Remove a row directly, as if deleted by another device.
    pub fn remove_row(&self, collection: RemoteCollection, id: &str) {
        if let Some(rows) = self.state().rows.get_mut(&collection) {
            rows.remove(id);
        }
    }

    async fn enter(&self) -> Result<(), RemoteError> {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        self.state().calls += 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Http {
                status: 503,
                body: "service unavailable".into(),
            });
        }
        Ok(())
    }

    fn reject_failing(&self, id: &str) -> Result<(), RemoteError> {
        if self.state().failing_ids.contains(id) {
            return Err(RemoteError::Http {
                status: 500,
                body: format!("write of {id} failed"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteAdapter for MemoryRemote {
    async fn create(
        &self,
        collection: RemoteCollection,
        payload: Value,
        owner_id: &str,
    ) -> Result<Value, RemoteError> {
        self.enter().await?;
        let id = payload_id(&payload)?;
        self.reject_failing(&id)?;

        let row = with_field(payload, OWNER_FIELD, owner_id);
        let mut state = self.state();
        state
            .rows
            .entry(collection)
            .or_default()
            .insert(id.clone(), row.clone());
        state.applied.push(id);
        Ok(row)
    }

    async fn list(
        &self,
        collection: RemoteCollection,
        owner_id: &str,
    ) -> Result<Vec<Value>, RemoteError> {
        self.enter().await?;
        let state = self.state();
        Ok(state
            .rows
            .get(&collection)
            .map(|rows| {
                rows.values()
                    .filter(|row| row.get(OWNER_FIELD).and_then(Value::as_str) == Some(owner_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(
        &self,
        collection: RemoteCollection,
        id: &str,
        patch: Value,
    ) -> Result<Value, RemoteError> {
        self.enter().await?;
        self.reject_failing(id)?;
        let mut state = self.state();
        let row = state
            .rows
            .get_mut(&collection)
            .and_then(|rows| rows.get_mut(id))
            .ok_or_else(|| RemoteError::Http {
                status: 404,
                body: format!("no row {id} in {}", collection.table()),
            })?;
        merge_object(row, patch);
        let updated = row.clone();
        state.applied.push(id.to_string());
        Ok(updated)
    }

    async fn delete(&self, collection: RemoteCollection, id: &str) -> Result<(), RemoteError> {
        self.enter().await?;
        if let Some(rows) = self.state().rows.get_mut(&collection) {
            rows.remove(id);
        }
        Ok(())
    }

    async fn get_profile(&self, owner_id: &str) -> Result<Option<Value>, RemoteError> {
        self.enter().await?;
        Ok(self.state().profiles.get(owner_id).cloned())
    }

    async fn upsert_profile(&self, payload: Value) -> Result<Value, RemoteError> {
        self.enter().await?;
        let id = payload_id(&payload)?;
        self.reject_failing(&id)?;

        let mut state = self.state();
        let row = state
            .profiles
            .entry(id.clone())
            .or_insert_with(|| Value::Object(Default::default()));
        merge_object(row, payload);
        let stored = row.clone();
        state.applied.push(id);
        Ok(stored)
    }

    async fn probe_health(&self) -> bool {
        if self.enter().await.is_err() {
            return false;
        }
        self.healthy.load(Ordering::SeqCst)
    }
}
