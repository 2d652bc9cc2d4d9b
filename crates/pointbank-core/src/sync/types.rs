//! Core types for remote synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{PointRecord, RankingState, Settings, TimeUsageRecord};

/// What a queued intent mutates remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTarget {
    PointRecord,
    TimeRecord,
    RankingState,
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Upsert,
}

/// A queued description of a mutation awaiting remote application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncIntent {
    /// Unique identifier, used to de-duplicate on replay.
    pub id: String,
    pub target: SyncTarget,
    pub action: SyncAction,
    /// Snapshot of the entity at enqueue time.
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}

impl SyncIntent {
    pub fn new(
        target: SyncTarget,
        action: SyncAction,
        payload: serde_json::Value,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("intent-{}", Uuid::new_v4()),
            target,
            action,
            payload,
            enqueued_at,
        }
    }

    pub fn create_point(
        record: &PointRecord,
        at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            SyncTarget::PointRecord,
            SyncAction::Create,
            serde_json::to_value(record)?,
            at,
        ))
    }

    pub fn create_time(
        record: &TimeUsageRecord,
        at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            SyncTarget::TimeRecord,
            SyncAction::Create,
            serde_json::to_value(record)?,
            at,
        ))
    }

    pub fn upsert_rankings(
        state: &RankingState,
        at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            SyncTarget::RankingState,
            SyncAction::Upsert,
            serde_json::to_value(state)?,
            at,
        ))
    }

    pub fn upsert_profile(settings: &Settings, at: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            SyncTarget::Profile,
            SyncAction::Upsert,
            serde_json::to_value(settings)?,
            at,
        ))
    }
}

/// Operating mode of the sync manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// No connectivity check has resolved yet.
    #[default]
    Offline,
    LocalOnly,
    HybridIdle,
    HybridSyncing,
}

impl SyncMode {
    pub fn is_hybrid(self) -> bool {
        matches!(self, SyncMode::HybridIdle | SyncMode::HybridSyncing)
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncMode::Offline => "offline",
            SyncMode::LocalOnly => "local-only",
            SyncMode::HybridIdle => "hybrid-idle",
            SyncMode::HybridSyncing => "hybrid-syncing",
        };
        f.write_str(s)
    }
}

/// Mode and connectivity flags, owned by one sync manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncContext {
    pub mode: SyncMode,
    pub online: bool,
    pub remote_healthy: bool,
    /// A drain pass is in flight. Only the pass itself clears it; `mode`
    /// may change underneath a running pass.
    pub draining: bool,
}

/// Current sync status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub mode: SyncMode,
    pub online: bool,
    pub remote_healthy: bool,
    /// Number of intents waiting in the queue.
    pub pending_count: usize,
    /// Whether a drain pass is currently running.
    pub in_progress: bool,
    /// Completion time of the last drain pass, partial or not.
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Result of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Intent ids applied remotely and removed from the queue, in order.
    pub applied: Vec<String>,
    /// Intent ids that failed and stay queued, in order.
    pub retained: Vec<String>,
}

impl SyncReport {
    pub fn attempted(&self) -> usize {
        self.applied.len() + self.retained.len()
    }

    pub fn is_clean(&self) -> bool {
        self.retained.is_empty()
    }
}

/// Why a sync request did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another drain pass is in flight.
    AlreadySyncing,
    /// Not in hybrid mode, or connectivity is down.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed(SyncReport),
    Skipped { reason: SkipReason, mode: SyncMode },
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped { .. } => None,
        }
    }
}
