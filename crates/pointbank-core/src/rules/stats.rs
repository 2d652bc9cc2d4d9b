//! Per-week summaries built on top of the rules engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calendar::WeekCalendar;
use crate::model::{PointKind, PointRecord, TimeUsageRecord};

use super::{
    available_time, consecutive_bonus, remaining_from, used_time, AvailableTime, TimeBuckets,
};

/// Everything the dashboard shows for one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyStats {
    pub week: u32,
    pub total_points: i64,
    pub positive_points: i64,
    pub negative_points: i64,
    /// Sum per kind; kinds with no records in the week report 0.
    pub points_by_kind: BTreeMap<PointKind, i64>,
    pub record_count: usize,
    pub available_time: AvailableTime,
    pub used_time: TimeBuckets,
    pub remaining_time: TimeBuckets,
    pub has_consecutive_bonus: bool,
}

pub fn weekly_stats(
    records: &[PointRecord],
    time_records: &[TimeUsageRecord],
    week: u32,
    calendar: &WeekCalendar,
) -> WeeklyStats {
    let in_week: Vec<&PointRecord> = records.iter().filter(|r| r.week_number == week).collect();

    let mut points_by_kind: BTreeMap<PointKind, i64> =
        PointKind::ALL.into_iter().map(|kind| (kind, 0)).collect();
    for record in &in_week {
        *points_by_kind.entry(record.kind).or_insert(0) += record.value;
    }

    let available = available_time(records, week);
    let used = used_time(time_records, week, calendar);

    WeeklyStats {
        week,
        total_points: in_week.iter().map(|r| r.value).sum(),
        positive_points: in_week.iter().map(|r| r.value).filter(|v| *v > 0).sum(),
        negative_points: in_week.iter().map(|r| r.value).filter(|v| *v < 0).sum(),
        points_by_kind,
        record_count: in_week.len(),
        available_time: available,
        used_time: used,
        remaining_time: remaining_from(&available, &used),
        has_consecutive_bonus: consecutive_bonus(records, week),
    }
}

/// Stats for the `weeks_back` weeks ending at `current_week`, oldest first.
/// Stops at week 1.
pub fn history(
    records: &[PointRecord],
    time_records: &[TimeUsageRecord],
    current_week: u32,
    weeks_back: u32,
    calendar: &WeekCalendar,
) -> Vec<WeeklyStats> {
    let mut stats: Vec<WeeklyStats> = (0..weeks_back)
        .map_while(|offset| current_week.checked_sub(offset))
        .filter(|week| *week >= 1)
        .map(|week| weekly_stats(records, time_records, week, calendar))
        .collect();
    stats.reverse();
    stats
}
