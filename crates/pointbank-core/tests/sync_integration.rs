//! Integration tests for offline-first sync through the ledger.
//!
//! Uses the in-process remote and a manual connectivity switch, so every
//! transition (offline, outage, recovery) is driven explicitly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use pointbank_core::storage::{MemoryBackend, StorageBackend, StorageKey};
use pointbank_core::sync::{
    ManualConnectivity, MemoryRemote, RemoteCollection, SkipReason, SyncManager, SyncMode,
    SyncOutcome, OWNER_FIELD,
};
use pointbank_core::{
    Ledger, LedgerEvent, ManualClock, PersistenceError, PointKind, ProgressKind, RankingState,
    RecordStore, TimeKind, WeekCalendar,
};

const OWNER: &str = "student-integration";

/// Memory backend that refuses writes to one chosen entry.
#[derive(Default)]
struct KeyOutageBackend {
    inner: MemoryBackend,
    down: Mutex<Option<StorageKey>>,
}

impl KeyOutageBackend {
    fn take_down(&self, key: Option<StorageKey>) {
        *self.down.lock().unwrap() = key;
    }

    fn check(&self, key: &str) -> Result<(), PersistenceError> {
        match *self.down.lock().unwrap() {
            Some(down) if down.as_str() == key => {
                Err(PersistenceError::Unavailable(format!("{key} offline")))
            }
            _ => Ok(()),
        }
    }
}

impl StorageBackend for KeyOutageBackend {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.check(key)?;
        self.inner.put(key, value)
    }

    fn put_many(&self, entries: &[(&str, &str)]) -> Result<(), PersistenceError> {
        for (key, _) in entries {
            self.check(key)?;
        }
        self.inner.put_many(entries)
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.inner.remove(key)
    }
}

struct Device {
    ledger: Ledger,
    store: Arc<RecordStore>,
    net: Arc<ManualConnectivity>,
    manager: Arc<SyncManager>,
}

async fn device(remote: Arc<MemoryRemote>, online: bool) -> Device {
    device_with_store(Arc::new(RecordStore::in_memory()), remote, online).await
}

async fn device_with_store(
    store: Arc<RecordStore>,
    remote: Arc<MemoryRemote>,
    online: bool,
) -> Device {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap(),
    ));
    let net = Arc::new(ManualConnectivity::new(online));
    let manager = Arc::new(
        SyncManager::new(store.clone(), remote, net.clone(), clock.clone(), OWNER)
            .unwrap()
            .with_timeout(Duration::from_millis(500)),
    );
    manager.initialize().await;
    let ledger = Ledger::new(store.clone(), clock, WeekCalendar::utc()).with_sync(manager.clone());
    Device {
        ledger,
        store,
        net,
        manager,
    }
}

#[tokio::test]
async fn test_online_write_reaches_remote_immediately() {
    let remote = Arc::new(MemoryRemote::new());
    let d = device(remote.clone(), true).await;
    assert_eq!(d.manager.mode(), SyncMode::HybridIdle);

    let record = d
        .ledger
        .add_points(PointKind::Handwriting, None, None)
        .await
        .unwrap();

    let rows = remote.rows(RemoteCollection::PointRecords);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], record.id.as_str());
    assert_eq!(rows[0][OWNER_FIELD], OWNER);
    assert_eq!(d.manager.pending_count(), 0);
}

#[tokio::test]
async fn test_offline_writes_queue_and_drain_on_recovery() {
    let remote = Arc::new(MemoryRemote::new());
    let d = device(remote.clone(), false).await;
    assert_eq!(d.manager.mode(), SyncMode::LocalOnly);

    let first = d
        .ledger
        .add_points(PointKind::SpecialReward, Some(120), None)
        .await
        .unwrap();
    let spend = d
        .ledger
        .use_time(TimeKind::Game, 30, Some("chess"))
        .await
        .unwrap();

    // Local commits are visible even though nothing left the device.
    assert_eq!(d.ledger.total_points().await.unwrap(), 120);
    assert_eq!(d.manager.pending_count(), 2);
    assert!(remote.rows(RemoteCollection::PointRecords).is_empty());
    assert_eq!(d.store.sync_queue().unwrap().len(), 2);

    d.net.set_online(true);
    assert_eq!(d.manager.on_connectivity_restored().await, SyncMode::HybridIdle);

    assert_eq!(d.manager.pending_count(), 0);
    assert_eq!(remote.applied_order(), vec![first.id.clone(), spend.id.clone()]);
    assert_eq!(remote.rows(RemoteCollection::TimeRecords).len(), 1);
    assert!(d.store.sync_queue().unwrap().is_empty());
    assert!(d.ledger.sync_status().unwrap().unwrap().last_sync_at.is_some());
}

#[tokio::test]
async fn test_outage_keeps_intents_for_next_pass() {
    let remote = Arc::new(MemoryRemote::new());
    let d = device(remote.clone(), true).await;
    remote.set_failing(true);

    d.ledger
        .add_points(PointKind::ExamTop5, None, None)
        .await
        .unwrap();
    let status = d.ledger.sync_status().unwrap().unwrap();
    assert_eq!(status.pending_count, 1);
    assert_eq!(status.mode, SyncMode::HybridIdle);

    remote.set_failing(false);
    match d.ledger.sync_now().await {
        Some(SyncOutcome::Completed(report)) => {
            assert_eq!(report.applied.len(), 1);
            assert!(report.is_clean());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(remote.rows(RemoteCollection::PointRecords).len(), 1);
}

#[tokio::test]
async fn test_progress_upserts_profile_rankings() {
    let remote = Arc::new(MemoryRemote::new());
    let d = device(remote.clone(), true).await;

    d.ledger
        .record_progress(ProgressKind::TotalClass, 4, None)
        .await
        .unwrap();

    let profile = remote.profile(OWNER).expect("profile upserted");
    assert_eq!(profile["totalClassRanking"], 4);
    assert_eq!(profile["id"], OWNER);
    assert_eq!(remote.rows(RemoteCollection::PointRecords).len(), 1);
}

#[tokio::test]
async fn test_second_device_sees_merged_records() {
    let remote = Arc::new(MemoryRemote::new());
    let phone = device(remote.clone(), true).await;
    let laptop = device(remote.clone(), true).await;

    phone
        .ledger
        .add_points(PointKind::SpecialReward, Some(40), None)
        .await
        .unwrap();
    laptop
        .ledger
        .add_points(PointKind::Handwriting, None, None)
        .await
        .unwrap();

    // Reads pull the remote set and merge it into the local store.
    assert_eq!(laptop.ledger.total_points().await.unwrap(), 45);
    assert_eq!(laptop.store.point_records().unwrap().len(), 2);
    assert_eq!(phone.ledger.weekly_points(42).await.unwrap(), 45);
}

#[tokio::test]
async fn test_reads_fall_back_to_local_view_during_outage() {
    let remote = Arc::new(MemoryRemote::new());
    let d = device(remote.clone(), true).await;
    d.ledger
        .add_points(PointKind::Handwriting, None, None)
        .await
        .unwrap();

    remote.set_failing(true);
    assert_eq!(d.ledger.total_points().await.unwrap(), 5);
}

#[tokio::test]
async fn test_lost_connectivity_skips_drain() {
    let remote = Arc::new(MemoryRemote::new());
    let d = device(remote.clone(), true).await;
    d.net.set_online(false);
    d.manager.on_connectivity_lost();

    d.ledger
        .add_points(PointKind::ErrorCollection, None, None)
        .await
        .unwrap();
    assert_eq!(d.manager.pending_count(), 1);
    assert!(matches!(
        d.ledger.sync_now().await,
        Some(SyncOutcome::Skipped {
            reason: SkipReason::Unavailable,
            mode: SyncMode::LocalOnly,
        })
    ));
}

#[tokio::test]
async fn test_rejected_write_is_not_queued() {
    let remote = Arc::new(MemoryRemote::new());
    let d = device(remote.clone(), false).await;

    assert!(d.ledger.use_time(TimeKind::Game, 10, None).await.is_err());
    assert!(d
        .ledger
        .add_points(PointKind::SpecialReward, Some(0), None)
        .await
        .is_err());
    assert_eq!(d.manager.pending_count(), 0);
    assert!(d.store.sync_queue().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_local_commit_is_not_queued() {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(RecordStore::new(backend.clone()));
    let remote = Arc::new(MemoryRemote::new());
    let d = device_with_store(store, remote.clone(), true).await;

    backend.set_unavailable(true);
    assert!(d
        .ledger
        .add_points(PointKind::Handwriting, None, None)
        .await
        .is_err());
    backend.set_unavailable(false);

    assert_eq!(d.manager.pending_count(), 0);
    assert!(d.store.point_records().unwrap().is_empty());
    assert!(remote.rows(RemoteCollection::PointRecords).is_empty());
}

#[tokio::test]
async fn test_queue_write_failure_keeps_committed_write() {
    let backend = Arc::new(KeyOutageBackend::default());
    let store = Arc::new(RecordStore::new(backend.clone()));
    let remote = Arc::new(MemoryRemote::new());
    let d = device_with_store(store, remote.clone(), false).await;
    let mut events = d.ledger.subscribe();

    backend.take_down(Some(StorageKey::SyncQueue));
    let record = d
        .ledger
        .add_points(PointKind::Handwriting, None, None)
        .await
        .unwrap();
    d.ledger
        .record_progress(ProgressKind::Subject, 7, None)
        .await
        .unwrap();

    assert!(matches!(
        events.try_recv().unwrap(),
        LedgerEvent::PointsChanged { .. }
    ));
    assert_eq!(d.store.point_records().unwrap().len(), 2);
    assert_eq!(d.store.ranking_state().unwrap().subject_rank, 7);
    // Queued in memory only until the store accepts the queue again.
    assert_eq!(d.manager.pending_count(), 3);
    assert!(d.store.sync_queue().unwrap().is_empty());

    backend.take_down(None);
    d.net.set_online(true);
    assert_eq!(d.manager.on_connectivity_restored().await, SyncMode::HybridIdle);
    assert_eq!(d.manager.pending_count(), 0);
    assert_eq!(remote.applied_order()[0], record.id);
    assert_eq!(remote.rows(RemoteCollection::PointRecords).len(), 2);
    assert_eq!(remote.profile(OWNER).unwrap()["subjectRanking"], 7);
}

#[tokio::test]
async fn test_failed_rank_write_awards_nothing() {
    let backend = Arc::new(KeyOutageBackend::default());
    let store = Arc::new(RecordStore::new(backend.clone()));
    let remote = Arc::new(MemoryRemote::new());
    let d = device_with_store(store, remote, false).await;

    backend.take_down(Some(StorageKey::CurrentRankings));
    assert!(d
        .ledger
        .record_progress(ProgressKind::Subject, 7, None)
        .await
        .is_err());
    assert!(d.store.point_records().unwrap().is_empty());
    assert_eq!(d.store.ranking_state().unwrap(), RankingState::default());
    assert_eq!(d.manager.pending_count(), 0);

    backend.take_down(None);
    let record = d
        .ledger
        .record_progress(ProgressKind::Subject, 7, None)
        .await
        .unwrap();
    assert_eq!(record.value, 15);
    assert_eq!(d.ledger.total_points().await.unwrap(), 15);
}

#[tokio::test]
async fn test_local_only_ledger_never_queues() {
    let store = Arc::new(RecordStore::in_memory());
    let ledger = Ledger::new(
        store.clone(),
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap(),
        )),
        WeekCalendar::utc(),
    );
    ledger
        .add_points(PointKind::Handwriting, None, None)
        .await
        .unwrap();

    assert!(store.sync_queue().unwrap().is_empty());
    assert!(ledger.sync_status().unwrap().is_none());
    assert!(ledger.sync_now().await.is_none());
}

#[tokio::test]
async fn test_subscribers_notified_once_per_commit() {
    let remote = Arc::new(MemoryRemote::new());
    let d = device(remote, false).await;
    let mut events = d.ledger.subscribe();

    let record = d
        .ledger
        .add_points(PointKind::TeacherComplaint, None, None)
        .await
        .unwrap();

    match events.try_recv().unwrap() {
        LedgerEvent::PointsChanged { delta, record: got, .. } => {
            assert_eq!(delta, -20);
            assert_eq!(got.id, record.id);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let remote = Arc::new(MemoryRemote::new());
    let d = device(remote.clone(), false).await;
    d.ledger
        .add_points(PointKind::Handwriting, None, None)
        .await
        .unwrap();
    d.ledger.shutdown().unwrap();

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 15, 8, 0, 0).unwrap(),
    ));
    let restarted = SyncManager::new(
        d.store.clone(),
        remote.clone(),
        Arc::new(ManualConnectivity::new(true)),
        clock,
        OWNER,
    )
    .unwrap();
    assert_eq!(restarted.pending_count(), 1);
    restarted.initialize().await;
    assert_eq!(restarted.pending_count(), 0);
    assert_eq!(remote.rows(RemoteCollection::PointRecords).len(), 1);
}
