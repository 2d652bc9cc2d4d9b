//! Public write/read surface over the record store, rules engine, notifier
//! and optional sync manager.
//!
//! Write path: validate, commit locally, queue an intent (hybrid setups
//! only), notify, then drain if the sync manager is idle and online. Remote
//! or queue trouble never fails a write once the local commit succeeded.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::calendar::{Clock, SystemClock, WeekCalendar};
use crate::error::{CoreError, Result, ValidationError};
use crate::events::{LedgerEvent, Notifier};
use crate::model::{
    PointDetails, PointKind, PointRecord, ProgressKind, RankingState, Settings, TimeKind,
    TimeUsageRecord,
};
use crate::owner_id::get_or_create_owner_id;
use crate::rules::{self, AvailableTime, TimeBuckets, WeeklyStats};
use crate::storage::{Config, RecordStore};
use crate::sync::{
    HttpRemote, SyncIntent, SyncManager, SyncOutcome, SyncStatus, TcpConnectivity,
};

pub struct Ledger {
    store: Arc<RecordStore>,
    sync: Option<Arc<SyncManager>>,
    clock: Arc<dyn Clock>,
    calendar: WeekCalendar,
    notifier: Notifier,
}

impl Ledger {
    /// Local-only ledger.
    pub fn new(store: Arc<RecordStore>, clock: Arc<dyn Clock>, calendar: WeekCalendar) -> Self {
        Self {
            store,
            sync: None,
            clock,
            calendar,
            notifier: Notifier::new(),
        }
    }

    /// Attach a sync manager. Writes from now on are queued for the remote.
    pub fn with_sync(mut self, sync: Arc<SyncManager>) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Open the default on-disk store and wire up the remote from `config`.
    pub async fn open(config: &Config) -> Result<Self> {
        let store = Arc::new(RecordStore::open_default()?);
        Self::open_with_store(config, store).await
    }

    /// Like [`Ledger::open`] over an existing store.
    ///
    /// A remote that is disabled or fails to build leaves the ledger
    /// local-only.
    pub async fn open_with_store(config: &Config, store: Arc<RecordStore>) -> Result<Self> {
        let calendar = config.week_calendar()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ledger = Self::new(store.clone(), clock.clone(), calendar);
        if !config.remote.is_usable() {
            debug!("no remote configured, running local-only");
            return Ok(ledger);
        }

        let remote = match HttpRemote::from_config(&config.remote) {
            Ok(remote) => remote,
            Err(err) => {
                warn!(error = %err, "remote misconfigured, running local-only");
                return Ok(ledger);
            }
        };
        let probe = match TcpConnectivity::for_url(&config.remote.base_url, config.remote.timeout())
        {
            Ok(probe) => probe,
            Err(err) => {
                warn!(error = %err, "remote misconfigured, running local-only");
                return Ok(ledger);
            }
        };
        let owner_id = get_or_create_owner_id(&store)?;
        let manager = SyncManager::new(store, Arc::new(remote), Arc::new(probe), clock, owner_id)?
            .with_timeout(config.remote.timeout());
        manager.initialize().await;
        Ok(ledger.with_sync(Arc::new(manager)))
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn sync_manager(&self) -> Option<&Arc<SyncManager>> {
        self.sync.as_ref()
    }

    pub fn calendar(&self) -> &WeekCalendar {
        &self.calendar
    }

    /// Receive notifications for commits made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.notifier.subscribe()
    }

    pub fn today(&self) -> NaiveDate {
        self.calendar.today(self.clock.as_ref())
    }

    pub fn current_week(&self) -> u32 {
        self.calendar.current_week(self.clock.as_ref())
    }

    pub fn is_settlement_day(&self) -> bool {
        rules::is_settlement_day(self.today())
    }

    pub fn is_usage_day(&self) -> bool {
        rules::is_usage_day(self.today())
    }

    // ── writes ──────────────────────────────────────────────────────────

    /// Record a fixed-value or caller-valued award/penalty.
    ///
    /// Fixed kinds fall back to their default value. Progress and practice
    /// kinds are computed and must go through their own methods.
    pub async fn add_points(
        &self,
        kind: PointKind,
        value: Option<i64>,
        description: Option<&str>,
    ) -> Result<PointRecord> {
        if kind.is_progress() || kind == PointKind::ErrorPractice {
            return Err(ValidationError::InvalidValue {
                field: "kind".into(),
                message: format!("{kind} points are computed, not entered directly"),
            }
            .into());
        }
        let value = value
            .or_else(|| rules::default_value(kind))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "value".into(),
                message: format!("{kind} requires an explicit value"),
            })?;
        if value == 0 {
            return Err(ValidationError::ZeroPoints {
                kind: kind.to_string(),
            }
            .into());
        }

        let record = PointRecord::new(
            kind,
            value,
            description.unwrap_or(kind.label()),
            PointDetails::Plain,
            self.clock.now(),
            &self.calendar,
        );
        self.commit_point(record, None).await
    }

    /// Award points for a rank improvement and move the stored rank.
    ///
    /// A regression or unchanged rank is rejected and leaves the ranking
    /// state untouched.
    pub async fn record_progress(
        &self,
        kind: ProgressKind,
        new_rank: u32,
        description: Option<&str>,
    ) -> Result<PointRecord> {
        if new_rank == 0 {
            return Err(ValidationError::InvalidValue {
                field: "rank".into(),
                message: "rank must be a positive integer".into(),
            }
            .into());
        }
        let mut state = self.store.ranking_state()?;
        let old_rank = kind.current_rank(&state);
        let points = rules::progress_points(old_rank, new_rank, kind);
        if points <= 0 {
            return Err(ValidationError::NoImprovement { old_rank, new_rank }.into());
        }
        kind.apply(&mut state, new_rank);

        let point_kind = kind.point_kind();
        let fallback = format!("{}: {old_rank} -> {new_rank}", point_kind.label());
        let record = PointRecord::new(
            point_kind,
            points,
            description.unwrap_or(&fallback),
            PointDetails::Progress { old_rank, new_rank },
            self.clock.now(),
            &self.calendar,
        );
        self.commit_point(record, Some(state)).await
    }

    /// Award one point per practiced question when accuracy reaches 80%.
    pub async fn record_error_practice(
        &self,
        correct: u32,
        total: u32,
        description: Option<&str>,
    ) -> Result<PointRecord> {
        if !rules::validate_error_practice_accuracy(correct, total)? {
            return Err(ValidationError::AccuracyBelowThreshold { correct, total }.into());
        }
        let fallback = format!("{} ({correct}/{total})", PointKind::ErrorPractice.label());
        let record = PointRecord::new(
            PointKind::ErrorPractice,
            rules::error_practice_points(total),
            description.unwrap_or(&fallback),
            PointDetails::Practice { correct, total },
            self.clock.now(),
            &self.calendar,
        );
        self.commit_point(record, None).await
    }

    /// Spend leisure minutes from the current week's allowance.
    pub async fn use_time(
        &self,
        kind: TimeKind,
        minutes: u32,
        description: Option<&str>,
    ) -> Result<TimeUsageRecord> {
        if minutes == 0 {
            return Err(ValidationError::ZeroMinutes.into());
        }
        let remaining = self.remaining_time(self.current_week()).await?;
        if !rules::validate_time_usage(kind, minutes, &remaining) {
            return Err(ValidationError::InsufficientTime {
                kind,
                requested: minutes,
                remaining: remaining.for_kind(kind),
            }
            .into());
        }

        let now = self.clock.now();
        let record = TimeUsageRecord::new(kind, minutes, description.unwrap_or_default(), now);
        self.store.append(&record)?;
        if let Some(sync) = &self.sync {
            queue_intent(sync, SyncIntent::create_time(&record, now));
        }
        self.notifier.emit(LedgerEvent::time_changed(&record));
        self.drain_after_write().await;
        Ok(record)
    }

    /// Overwrite the stored ranks, e.g. at the start of a term.
    pub async fn set_rankings(&self, state: RankingState) -> Result<RankingState> {
        state.validate()?;
        self.store.set_ranking_state(&state)?;
        if let Some(sync) = &self.sync {
            queue_intent(sync, SyncIntent::upsert_rankings(&state, self.clock.now()));
        }
        self.drain_after_write().await;
        Ok(state)
    }

    /// Persist preferences. The owner id is kept when `settings` has none.
    pub async fn update_settings(&self, mut settings: Settings) -> Result<Settings> {
        if settings.student_id.is_none() {
            settings.student_id = self.store.settings()?.student_id;
        }
        self.store.set_settings(&settings)?;
        if let Some(sync) = &self.sync {
            queue_intent(sync, SyncIntent::upsert_profile(&settings, self.clock.now()));
        }
        self.drain_after_write().await;
        Ok(settings)
    }

    async fn commit_point(
        &self,
        record: PointRecord,
        rankings: Option<RankingState>,
    ) -> Result<PointRecord> {
        match &rankings {
            Some(state) => self.store.append_with_rankings(&record, state)?,
            None => self.store.append(&record)?,
        }
        if let Some(sync) = &self.sync {
            let now = self.clock.now();
            queue_intent(sync, SyncIntent::create_point(&record, now));
            if let Some(state) = &rankings {
                queue_intent(sync, SyncIntent::upsert_rankings(state, now));
            }
        }
        debug!(id = %record.id, kind = %record.kind, value = record.value, "points committed");
        self.notifier.emit(LedgerEvent::points_changed(&record));
        self.drain_after_write().await;
        Ok(record)
    }

    async fn drain_after_write(&self) {
        if let Some(sync) = &self.sync {
            if sync.can_sync() {
                sync.sync().await;
            }
        }
    }

    // ── reads ───────────────────────────────────────────────────────────

    async fn refresh(&self) -> Result<()> {
        if let Some(sync) = &self.sync {
            sync.refresh_view().await?;
        }
        Ok(())
    }

    async fn snapshot(&self) -> Result<(Vec<PointRecord>, Vec<TimeUsageRecord>)> {
        self.refresh().await?;
        Ok((self.store.point_records()?, self.store.time_records()?))
    }

    pub async fn point_records(&self) -> Result<Vec<PointRecord>> {
        self.refresh().await?;
        Ok(self.store.point_records()?)
    }

    pub async fn time_records(&self) -> Result<Vec<TimeUsageRecord>> {
        self.refresh().await?;
        Ok(self.store.time_records()?)
    }

    pub async fn total_points(&self) -> Result<i64> {
        Ok(rules::total_points(&self.point_records().await?))
    }

    pub async fn weekly_points(&self, week: u32) -> Result<i64> {
        Ok(rules::weekly_points(&self.point_records().await?, week))
    }

    pub async fn available_time(&self, week: u32) -> Result<AvailableTime> {
        Ok(rules::available_time(&self.point_records().await?, week))
    }

    pub async fn used_time(&self, week: u32) -> Result<TimeBuckets> {
        Ok(rules::used_time(
            &self.time_records().await?,
            week,
            &self.calendar,
        ))
    }

    pub async fn remaining_time(&self, week: u32) -> Result<TimeBuckets> {
        let (points, times) = self.snapshot().await?;
        Ok(rules::remaining_time(&points, &times, week, &self.calendar))
    }

    pub async fn consecutive_bonus(&self, week: u32) -> Result<bool> {
        Ok(rules::consecutive_bonus(&self.point_records().await?, week))
    }

    /// Summary for one week, also cached in the store.
    pub async fn weekly_stats(&self, week: u32) -> Result<WeeklyStats> {
        let (points, times) = self.snapshot().await?;
        let stats = rules::weekly_stats(&points, &times, week, &self.calendar);
        if let Err(err) = self.store.put_weekly_stats(&stats) {
            warn!(week, error = %err, "failed to cache weekly stats");
        }
        Ok(stats)
    }

    /// Stats for the last `weeks_back` weeks up to the current one, oldest
    /// first.
    pub async fn history(&self, weeks_back: u32) -> Result<Vec<WeeklyStats>> {
        let (points, times) = self.snapshot().await?;
        Ok(rules::history(
            &points,
            &times,
            self.current_week(),
            weeks_back,
            &self.calendar,
        ))
    }

    pub fn ranking_state(&self) -> Result<RankingState> {
        Ok(self.store.ranking_state()?)
    }

    pub fn settings(&self) -> Result<Settings> {
        Ok(self.store.settings()?)
    }

    /// `None` when running local-only.
    pub fn sync_status(&self) -> Result<Option<SyncStatus>> {
        self.sync
            .as_ref()
            .map(|sync| sync.status())
            .transpose()
            .map_err(CoreError::from)
    }

    /// Explicit drain request. `None` when running local-only.
    pub async fn sync_now(&self) -> Option<SyncOutcome> {
        match &self.sync {
            Some(sync) => Some(sync.sync().await),
            None => None,
        }
    }

    /// Persist sync bookkeeping before exit.
    pub fn shutdown(&self) -> Result<()> {
        if let Some(sync) = &self.sync {
            sync.shutdown()?;
        }
        Ok(())
    }
}

/// Hand the remote counterpart of a locally committed write to the sync
/// manager. The write stands either way; an intent whose queue write failed
/// stays in memory and is persisted with the queue after the next pass.
fn queue_intent(sync: &SyncManager, intent: serde_json::Result<SyncIntent>) {
    match intent {
        Ok(intent) => {
            if let Err(err) = sync.enqueue(intent) {
                warn!(error = %err, "sync queue not persisted, intent kept in memory");
            }
        }
        Err(err) => warn!(error = %err, "failed to encode sync intent"),
    }
}
