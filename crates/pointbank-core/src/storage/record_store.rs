//! Typed, local-first persistence for records, ranking state, settings and
//! sync bookkeeping.
//!
//! Each collection is stored as one JSON entry in the backend. Ordinary
//! writes only ever append; `replace_all` is reserved for the merge step,
//! and `merge_all` performs read-merge-replace under the store's write lock
//! so an append landing mid-merge cannot be dropped.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::backend::{MemoryBackend, SqliteBackend, StorageBackend};
use super::StorageKey;
use crate::error::{CoreError, PersistenceError};
use crate::model::{PointRecord, RankingState, Settings, SyncRecord, TimeUsageRecord};
use crate::rules::WeeklyStats;
use crate::sync::merge::merge_records;
use crate::sync::types::SyncIntent;

/// A record kind with its own collection in the store.
pub trait StoredRecord: SyncRecord + Serialize + DeserializeOwned {
    const KEY: StorageKey;
}

impl StoredRecord for PointRecord {
    const KEY: StorageKey = StorageKey::PointRecords;
}

impl StoredRecord for TimeUsageRecord {
    const KEY: StorageKey = StorageKey::TimeRecords;
}

/// Local record store. Sole owner of every persisted entity.
pub struct RecordStore {
    backend: Arc<dyn StorageBackend>,
    write_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Store backed by `~/.config/pointbank/pointbank.db`.
    pub fn open_default() -> Result<Self, CoreError> {
        Ok(Self::new(Arc::new(SqliteBackend::open_default()?)))
    }

    /// Volatile store, mostly for tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>, PersistenceError> {
        match self.backend.get(key.as_str())? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| PersistenceError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn encode<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) -> Result<String, PersistenceError> {
        serde_json::to_string(value).map_err(|source| PersistenceError::Encode {
            key: key.to_string(),
            source,
        })
    }

    fn write<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) -> Result<(), PersistenceError> {
        let raw = self.encode(key, value)?;
        self.backend.put(key.as_str(), &raw)
    }

    /// Persist one record. Durable once this returns `Ok`.
    pub fn append<R: StoredRecord>(&self, record: &R) -> Result<(), PersistenceError> {
        let _guard = self.lock_writes();
        let mut records: Vec<R> = self.read(R::KEY)?.unwrap_or_default();
        records.push(record.clone());
        self.write(R::KEY, &records)?;
        debug!(key = %R::KEY, id = record.id(), total = records.len(), "record appended");
        Ok(())
    }

    /// Persist a progress award together with the ranks it moved. Neither
    /// is written unless both are.
    pub fn append_with_rankings<R: StoredRecord>(
        &self,
        record: &R,
        state: &RankingState,
    ) -> Result<(), PersistenceError> {
        let _guard = self.lock_writes();
        let mut records: Vec<R> = self.read(R::KEY)?.unwrap_or_default();
        records.push(record.clone());
        let records_raw = self.encode(R::KEY, &records)?;
        let state_raw = self.encode(StorageKey::CurrentRankings, state)?;
        self.backend.put_many(&[
            (R::KEY.as_str(), records_raw.as_str()),
            (StorageKey::CurrentRankings.as_str(), state_raw.as_str()),
        ])?;
        debug!(key = %R::KEY, id = record.id(), "record appended with rankings");
        Ok(())
    }

    /// All records of one kind, in storage order.
    pub fn get_all<R: StoredRecord>(&self) -> Result<Vec<R>, PersistenceError> {
        Ok(self.read(R::KEY)?.unwrap_or_default())
    }

    /// Swap the whole collection for a kind.
    pub fn replace_all<R: StoredRecord>(&self, records: &[R]) -> Result<(), PersistenceError> {
        let _guard = self.lock_writes();
        self.write(R::KEY, records)
    }

    /// Merge `remote` into the local collection and write the result back.
    pub fn merge_all<R: StoredRecord>(&self, remote: Vec<R>) -> Result<Vec<R>, PersistenceError> {
        let _guard = self.lock_writes();
        let local: Vec<R> = self.read(R::KEY)?.unwrap_or_default();
        let merged = merge_records(local, remote);
        self.write(R::KEY, &merged)?;
        Ok(merged)
    }

    pub fn point_records(&self) -> Result<Vec<PointRecord>, PersistenceError> {
        self.get_all()
    }

    pub fn time_records(&self) -> Result<Vec<TimeUsageRecord>, PersistenceError> {
        self.get_all()
    }

    /// Current ranks, or the initial ranks when none were stored yet.
    pub fn ranking_state(&self) -> Result<RankingState, PersistenceError> {
        Ok(self.read(StorageKey::CurrentRankings)?.unwrap_or_default())
    }

    pub fn set_ranking_state(&self, state: &RankingState) -> Result<(), PersistenceError> {
        let _guard = self.lock_writes();
        self.write(StorageKey::CurrentRankings, state)
    }

    pub fn settings(&self) -> Result<Settings, PersistenceError> {
        Ok(self.read(StorageKey::Settings)?.unwrap_or_default())
    }

    pub fn set_settings(&self, settings: &Settings) -> Result<(), PersistenceError> {
        let _guard = self.lock_writes();
        self.write(StorageKey::Settings, settings)
    }

    /// Cached weekly summaries keyed by week number.
    pub fn weekly_stats(&self) -> Result<BTreeMap<u32, WeeklyStats>, PersistenceError> {
        Ok(self.read(StorageKey::WeeklyStats)?.unwrap_or_default())
    }

    pub fn put_weekly_stats(&self, stats: &WeeklyStats) -> Result<(), PersistenceError> {
        let _guard = self.lock_writes();
        let mut cached: BTreeMap<u32, WeeklyStats> =
            self.read(StorageKey::WeeklyStats)?.unwrap_or_default();
        cached.insert(stats.week, stats.clone());
        self.write(StorageKey::WeeklyStats, &cached)
    }

    pub fn sync_queue(&self) -> Result<Vec<SyncIntent>, PersistenceError> {
        Ok(self.read(StorageKey::SyncQueue)?.unwrap_or_default())
    }

    pub fn save_sync_queue(&self, intents: &[SyncIntent]) -> Result<(), PersistenceError> {
        let _guard = self.lock_writes();
        self.write(StorageKey::SyncQueue, intents)
    }

    pub fn last_sync_at(&self) -> Result<Option<DateTime<Utc>>, PersistenceError> {
        self.read(StorageKey::LastSyncTime)
    }

    pub fn set_last_sync_at(&self, at: DateTime<Utc>) -> Result<(), PersistenceError> {
        let _guard = self.lock_writes();
        self.write(StorageKey::LastSyncTime, &at)
    }

    /// Raw JSON of one entry, as stored.
    pub fn raw_entry(&self, key: StorageKey) -> Result<Option<serde_json::Value>, PersistenceError> {
        self.read(key)
    }

    /// Overwrite one entry with arbitrary JSON.
    pub fn put_raw_entry(
        &self,
        key: StorageKey,
        value: &serde_json::Value,
    ) -> Result<(), PersistenceError> {
        let _guard = self.lock_writes();
        self.write(key, value)
    }

    /// Remove every entry, sync bookkeeping included.
    pub fn clear(&self) -> Result<(), PersistenceError> {
        let _guard = self.lock_writes();
        for key in StorageKey::ALL {
            self.backend.remove(key.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WeekCalendar;
    use crate::model::{PointDetails, PointKind, TimeKind};
    use chrono::{Duration, TimeZone};

    fn point_at(value: i64, ts: DateTime<Utc>) -> PointRecord {
        PointRecord::new(
            PointKind::SpecialReward,
            value,
            "",
            PointDetails::Plain,
            ts,
            &WeekCalendar::utc(),
        )
    }

    #[test]
    fn append_and_get_all() {
        let store = RecordStore::in_memory();
        let now = Utc::now();
        store.append(&point_at(5, now)).unwrap();
        store.append(&point_at(-20, now)).unwrap();
        store
            .append(&TimeUsageRecord::new(TimeKind::Game, 15, "", now))
            .unwrap();

        assert_eq!(store.point_records().unwrap().len(), 2);
        assert_eq!(store.time_records().unwrap().len(), 1);
    }

    #[test]
    fn append_fails_when_backend_unavailable() {
        let backend = Arc::new(MemoryBackend::new());
        let store = RecordStore::new(backend.clone());
        backend.set_unavailable(true);
        let err = store.append(&point_at(5, Utc::now())).unwrap_err();
        assert!(matches!(err, PersistenceError::Unavailable(_)));
        backend.set_unavailable(false);
        assert!(store.point_records().unwrap().is_empty());
    }

    #[test]
    fn append_with_rankings_writes_both_or_neither() {
        let backend = Arc::new(MemoryBackend::new());
        let store = RecordStore::new(backend.clone());
        let moved = RankingState {
            subject_rank: 7,
            ..RankingState::default()
        };

        backend.set_unavailable(true);
        assert!(store
            .append_with_rankings(&point_at(15, Utc::now()), &moved)
            .is_err());
        backend.set_unavailable(false);
        assert!(store.point_records().unwrap().is_empty());
        assert_eq!(store.ranking_state().unwrap(), RankingState::default());

        store
            .append_with_rankings(&point_at(15, Utc::now()), &moved)
            .unwrap();
        assert_eq!(store.point_records().unwrap().len(), 1);
        assert_eq!(store.ranking_state().unwrap().subject_rank, 7);
    }

    #[test]
    fn merge_all_keeps_local_only_records() {
        let store = RecordStore::in_memory();
        let base = Utc.with_ymd_and_hms(2026, 10, 12, 9, 0, 0).unwrap();
        let local = point_at(5, base);
        let shared = point_at(10, base + Duration::hours(1));
        store.append(&local).unwrap();
        store.append(&shared).unwrap();

        let mut remote_copy = shared.clone();
        remote_copy.description = "edited remotely".into();
        let merged = store.merge_all(vec![remote_copy]).unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].description, "edited remotely");
        assert_eq!(merged[1].id, local.id);
        assert_eq!(store.point_records().unwrap(), merged);
    }

    #[test]
    fn ranking_state_defaults_until_set() {
        let store = RecordStore::in_memory();
        assert_eq!(store.ranking_state().unwrap(), RankingState::default());

        let updated = RankingState {
            subject_rank: 3,
            ..RankingState::default()
        };
        store.set_ranking_state(&updated).unwrap();
        assert_eq!(store.ranking_state().unwrap().subject_rank, 3);
    }

    #[test]
    fn corrupt_entry_is_reported() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .put(StorageKey::PointRecords.as_str(), "not json")
            .unwrap();
        let store = RecordStore::new(backend);
        assert!(matches!(
            store.point_records(),
            Err(PersistenceError::Corrupt { .. })
        ));
    }

    #[test]
    fn clear_removes_everything() {
        let store = RecordStore::in_memory();
        store.append(&point_at(5, Utc::now())).unwrap();
        store.set_last_sync_at(Utc::now()).unwrap();
        store.clear().unwrap();
        assert!(store.point_records().unwrap().is_empty());
        assert!(store.last_sync_at().unwrap().is_none());
    }
}
