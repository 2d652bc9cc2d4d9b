//! Integration tests for the ledger write/read paths.
//!
//! Time is driven by a manual clock so week boundaries are deterministic.
//! 2026-10-14 is a Wednesday in ISO week 42.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use pointbank_core::storage::{export_snapshot, import_snapshot};
use pointbank_core::{
    Ledger, ManualClock, PointKind, ProgressKind, RecordStore, TimeKind, WeekCalendar,
};

fn ledger_at(y: i32, m: u32, d: u32) -> (Ledger, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap(),
    ));
    let ledger = Ledger::new(
        Arc::new(RecordStore::in_memory()),
        clock.clone(),
        WeekCalendar::utc(),
    );
    (ledger, clock)
}

#[tokio::test]
async fn test_handwriting_and_complaint_scenario() {
    let (ledger, _) = ledger_at(2026, 10, 14);
    let week = ledger.current_week();
    assert_eq!(week, 42);

    for _ in 0..3 {
        ledger
            .add_points(PointKind::Handwriting, None, None)
            .await
            .unwrap();
    }
    ledger
        .add_points(PointKind::TeacherComplaint, None, None)
        .await
        .unwrap();

    assert_eq!(ledger.total_points().await.unwrap(), -5);
    assert_eq!(ledger.weekly_points(week).await.unwrap(), -5);
    let available = ledger.available_time(week).await.unwrap();
    assert_eq!(available.total_minutes, 0);
    assert_eq!(available.game_minutes, 0);
    assert_eq!(available.entertainment_minutes, 0);

    // Nothing to spend.
    assert!(ledger.use_time(TimeKind::Game, 1, None).await.is_err());
}

#[tokio::test]
async fn test_consecutive_bonus_across_weeks() {
    let (ledger, clock) = ledger_at(2026, 10, 7);
    ledger
        .add_points(PointKind::SpecialReward, Some(310), None)
        .await
        .unwrap();

    clock.advance(Duration::days(7));
    ledger
        .add_points(PointKind::SpecialReward, Some(160), None)
        .await
        .unwrap();
    ledger
        .add_points(PointKind::SpecialReward, Some(160), None)
        .await
        .unwrap();

    assert_eq!(ledger.weekly_points(41).await.unwrap(), 310);
    assert_eq!(ledger.weekly_points(42).await.unwrap(), 320);
    assert!(ledger.consecutive_bonus(42).await.unwrap());
    assert!(!ledger.consecutive_bonus(41).await.unwrap());
    assert!(ledger.weekly_stats(42).await.unwrap().has_consecutive_bonus);
}

#[tokio::test]
async fn test_bonus_needs_both_weeks() {
    let (ledger, clock) = ledger_at(2026, 10, 7);
    ledger
        .add_points(PointKind::SpecialReward, Some(299), None)
        .await
        .unwrap();
    clock.advance(Duration::days(7));
    ledger
        .add_points(PointKind::SpecialReward, Some(400), None)
        .await
        .unwrap();

    assert!(!ledger.consecutive_bonus(42).await.unwrap());
}

#[tokio::test]
async fn test_allowance_caps_at_200_minutes() {
    let (ledger, _) = ledger_at(2026, 10, 14);
    ledger
        .add_points(PointKind::SpecialReward, Some(250), None)
        .await
        .unwrap();

    let available = ledger.available_time(42).await.unwrap();
    assert_eq!(available.total_minutes, 200);
    assert_eq!(available.game_minutes, 100);
    assert_eq!(available.entertainment_minutes, 100);
}

#[tokio::test]
async fn test_other_weeks_do_not_leak() {
    let (ledger, clock) = ledger_at(2026, 10, 7);
    ledger
        .add_points(PointKind::ExamTop5, None, None)
        .await
        .unwrap();
    clock.advance(Duration::days(7));
    ledger
        .add_points(PointKind::Handwriting, None, None)
        .await
        .unwrap();
    clock.advance(Duration::days(7));
    ledger
        .add_points(PointKind::ErrorCollection, None, None)
        .await
        .unwrap();

    assert_eq!(ledger.weekly_points(41).await.unwrap(), 15);
    assert_eq!(ledger.weekly_points(42).await.unwrap(), 5);
    assert_eq!(ledger.weekly_points(43).await.unwrap(), 2);
    assert_eq!(ledger.total_points().await.unwrap(), 22);
}

#[tokio::test]
async fn test_time_usage_drains_current_week_only() {
    let (ledger, clock) = ledger_at(2026, 10, 14);
    ledger
        .add_points(PointKind::SpecialReward, Some(100), None)
        .await
        .unwrap();
    ledger
        .use_time(TimeKind::Game, 50, Some("racing"))
        .await
        .unwrap();
    assert!(ledger.use_time(TimeKind::Game, 1, None).await.is_err());
    ledger
        .use_time(TimeKind::Entertainment, 25, None)
        .await
        .unwrap();

    let used = ledger.used_time(42).await.unwrap();
    assert_eq!(used.game_minutes, 50);
    assert_eq!(used.entertainment_minutes, 25);
    assert_eq!(used.total_minutes, 75);

    // A new week starts with a fresh (empty) allowance.
    clock.advance(Duration::days(7));
    assert_eq!(ledger.remaining_time(43).await.unwrap().total_minutes, 0);
    assert_eq!(ledger.used_time(43).await.unwrap().total_minutes, 0);
}

#[tokio::test]
async fn test_progress_chain_updates_rankings() {
    let (ledger, _) = ledger_at(2026, 10, 14);
    let first = ledger
        .record_progress(ProgressKind::Subject, 5, None)
        .await
        .unwrap();
    assert_eq!(first.value, 25);

    let second = ledger
        .record_progress(ProgressKind::Subject, 3, None)
        .await
        .unwrap();
    assert_eq!(second.value, 10);
    assert!(ledger
        .record_progress(ProgressKind::Subject, 4, None)
        .await
        .is_err());

    let ranks = ledger.ranking_state().unwrap();
    assert_eq!(ranks.subject_rank, 3);
    assert_eq!(ranks.total_grade_rank, 50);
    assert_eq!(ledger.total_points().await.unwrap(), 35);
}

#[tokio::test]
async fn test_history_is_chronological() {
    let (ledger, clock) = ledger_at(2026, 9, 30);
    for value in [10, 20, 30] {
        ledger
            .add_points(PointKind::SpecialReward, Some(value), None)
            .await
            .unwrap();
        clock.advance(Duration::days(7));
    }
    clock.advance(Duration::days(-7));

    let history = ledger.history(4).await.unwrap();
    let weeks: Vec<u32> = history.iter().map(|s| s.week).collect();
    assert_eq!(weeks, vec![39, 40, 41, 42]);
    let totals: Vec<i64> = history.iter().map(|s| s.total_points).collect();
    assert_eq!(totals, vec![0, 10, 20, 30]);
}

#[tokio::test]
async fn test_point_week_is_frozen_but_time_week_follows_calendar() {
    let store = Arc::new(RecordStore::in_memory());
    // Sunday 23:30 UTC, the last half hour of week 42.
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 18, 23, 30, 0).unwrap(),
    ));

    let utc_ledger = Ledger::new(store.clone(), clock.clone(), WeekCalendar::utc());
    utc_ledger
        .add_points(PointKind::SpecialReward, Some(80), None)
        .await
        .unwrap();
    utc_ledger
        .use_time(TimeKind::Game, 10, None)
        .await
        .unwrap();
    assert_eq!(utc_ledger.used_time(42).await.unwrap().game_minutes, 10);

    // One hour east the same instant is already Monday of week 43.
    let shifted = Ledger::new(
        store,
        clock,
        WeekCalendar::with_offset_minutes(60).unwrap(),
    );
    assert_eq!(shifted.weekly_points(42).await.unwrap(), 80);
    assert_eq!(shifted.used_time(42).await.unwrap().game_minutes, 0);
    assert_eq!(shifted.used_time(43).await.unwrap().game_minutes, 10);
}

#[tokio::test]
async fn test_export_import_between_installations() {
    let (source, _) = ledger_at(2026, 10, 14);
    source
        .add_points(PointKind::Handwriting, None, None)
        .await
        .unwrap();
    source
        .record_progress(ProgressKind::TotalClass, 8, None)
        .await
        .unwrap();
    source.weekly_stats(42).await.unwrap();

    let snapshot = export_snapshot(source.store()).unwrap();
    let (target, _) = ledger_at(2026, 10, 14);
    let applied = import_snapshot(target.store(), &snapshot).unwrap();

    assert!(applied.contains(&"POINT_RECORDS".to_string()));
    assert!(applied.contains(&"WEEKLY_STATS".to_string()));
    assert_eq!(
        target.point_records().await.unwrap(),
        source.point_records().await.unwrap()
    );
    assert_eq!(target.ranking_state().unwrap().total_class_rank, 8);
}
