//! Budget derivation over an event-log snapshot.
//!
//! Every function here is pure: the same records and week always produce
//! the same result. The only failure mode is malformed input (a practice
//! round with no questions).

pub mod stats;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::WeekCalendar;
use crate::error::ValidationError;
use crate::model::{PointKind, PointRecord, ProgressKind, TimeKind, TimeUsageRecord};

pub use stats::{history, weekly_stats, WeeklyStats};

/// One point converts into this many leisure minutes.
pub const MINUTES_PER_POINT: i64 = 1;
/// Weekly leisure allowance cap.
pub const MAX_WEEKLY_MINUTES: i64 = 200;
pub const GAME_TIME_RATIO: f64 = 0.5;
pub const ENTERTAINMENT_TIME_RATIO: f64 = 0.5;
/// Points awarded per rank gained on a progress kind.
pub const POINTS_PER_RANK: i64 = 5;
/// Points awarded per practiced question when accuracy passes.
pub const POINTS_PER_PRACTICE_QUESTION: i64 = 1;
/// Weekly threshold for the two-week streak bonus.
pub const CONSECUTIVE_BONUS_THRESHOLD: i64 = 300;
pub const SETTLEMENT_DAY: Weekday = Weekday::Fri;
pub const USAGE_DAYS: [Weekday; 2] = [Weekday::Sat, Weekday::Sun];

/// Leisure minutes unlocked by a week's points.
///
/// The two buckets are floored independently, so for an odd `total_minutes`
/// they add up to one minute less than the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AvailableTime {
    pub total_minutes: u32,
    pub game_minutes: u32,
    pub entertainment_minutes: u32,
}

impl AvailableTime {
    pub fn for_kind(&self, kind: TimeKind) -> u32 {
        match kind {
            TimeKind::Game => self.game_minutes,
            TimeKind::Entertainment => self.entertainment_minutes,
        }
    }
}

/// Minutes consumed (or still left) per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeBuckets {
    pub game_minutes: u32,
    pub entertainment_minutes: u32,
    pub total_minutes: u32,
}

impl TimeBuckets {
    pub fn for_kind(&self, kind: TimeKind) -> u32 {
        match kind {
            TimeKind::Game => self.game_minutes,
            TimeKind::Entertainment => self.entertainment_minutes,
        }
    }
}

/// Fixed award for kinds that have one. Progress, practice and the two
/// special kinds are computed or supplied by the caller.
pub fn default_value(kind: PointKind) -> Option<i64> {
    match kind {
        PointKind::Handwriting => Some(5),
        PointKind::ExamTop5 => Some(15),
        PointKind::ErrorCollection => Some(2),
        PointKind::TeacherComplaint => Some(-20),
        PointKind::SubjectProgress
        | PointKind::TotalProgress
        | PointKind::ErrorPractice
        | PointKind::BonusFreeTime
        | PointKind::SpecialReward => None,
    }
}

pub fn total_points(records: &[PointRecord]) -> i64 {
    records.iter().map(|r| r.value).sum()
}

/// Sum of values whose frozen week number equals `week`.
pub fn weekly_points(records: &[PointRecord], week: u32) -> i64 {
    records
        .iter()
        .filter(|r| r.week_number == week)
        .map(|r| r.value)
        .sum()
}

pub fn available_time(records: &[PointRecord], week: u32) -> AvailableTime {
    let points = weekly_points(records, week);
    let total = points
        .saturating_mul(MINUTES_PER_POINT)
        .clamp(0, MAX_WEEKLY_MINUTES);
    // total is within 0..=200 here
    let total_minutes = total as u32;

    AvailableTime {
        total_minutes,
        game_minutes: (f64::from(total_minutes) * GAME_TIME_RATIO).floor() as u32,
        entertainment_minutes: (f64::from(total_minutes) * ENTERTAINMENT_TIME_RATIO).floor() as u32,
    }
}

/// Minutes used in `week`, where each record's week is recomputed from its
/// timestamp.
pub fn used_time(
    time_records: &[TimeUsageRecord],
    week: u32,
    calendar: &WeekCalendar,
) -> TimeBuckets {
    let mut used = TimeBuckets::default();
    for record in time_records
        .iter()
        .filter(|r| calendar.week_number(r.timestamp) == week)
    {
        match record.kind {
            TimeKind::Game => used.game_minutes = used.game_minutes.saturating_add(record.minutes),
            TimeKind::Entertainment => {
                used.entertainment_minutes =
                    used.entertainment_minutes.saturating_add(record.minutes)
            }
        }
    }
    used.total_minutes = used
        .game_minutes
        .saturating_add(used.entertainment_minutes);
    used
}

/// What is left of the week's allowance. Never negative.
pub fn remaining_time(
    records: &[PointRecord],
    time_records: &[TimeUsageRecord],
    week: u32,
    calendar: &WeekCalendar,
) -> TimeBuckets {
    let available = available_time(records, week);
    let used = used_time(time_records, week, calendar);
    remaining_from(&available, &used)
}

pub fn remaining_from(available: &AvailableTime, used: &TimeBuckets) -> TimeBuckets {
    TimeBuckets {
        game_minutes: available.game_minutes.saturating_sub(used.game_minutes),
        entertainment_minutes: available
            .entertainment_minutes
            .saturating_sub(used.entertainment_minutes),
        total_minutes: available.total_minutes.saturating_sub(used.total_minutes),
    }
}

/// True when both `week` and the week before reached the bonus threshold.
/// Week 1 has no predecessor and never qualifies.
pub fn consecutive_bonus(records: &[PointRecord], week: u32) -> bool {
    let Some(previous) = week.checked_sub(1) else {
        return false;
    };
    weekly_points(records, week) >= CONSECUTIVE_BONUS_THRESHOLD
        && weekly_points(records, previous) >= CONSECUTIVE_BONUS_THRESHOLD
}

pub fn per_rank_value(kind: ProgressKind) -> i64 {
    match kind {
        ProgressKind::Subject | ProgressKind::TotalClass => POINTS_PER_RANK,
    }
}

/// Points for moving from `old_rank` to `new_rank` (lower is better).
/// Regressions and unchanged ranks earn nothing.
pub fn progress_points(old_rank: u32, new_rank: u32, kind: ProgressKind) -> i64 {
    let improvement = i64::from(old_rank) - i64::from(new_rank);
    if improvement > 0 {
        improvement * per_rank_value(kind)
    } else {
        0
    }
}

/// `correct / total >= 0.80`, boundary inclusive.
///
/// # Errors
/// `total == 0` is rejected rather than treated as a failed round, and
/// `correct > total` is rejected as malformed.
pub fn validate_error_practice_accuracy(correct: u32, total: u32) -> Result<bool, ValidationError> {
    if total == 0 {
        return Err(ValidationError::EmptyPractice);
    }
    if correct > total {
        return Err(ValidationError::InvalidValue {
            field: "correct".into(),
            message: format!("{correct} correct answers out of {total} questions"),
        });
    }
    // correct / total >= 4 / 5 without floating point
    Ok(u64::from(correct) * 5 >= u64::from(total) * 4)
}

pub fn error_practice_points(total: u32) -> i64 {
    i64::from(total) * POINTS_PER_PRACTICE_QUESTION
}

/// Whether `minutes` more of `kind` fit into what is left this week.
pub fn validate_time_usage(kind: TimeKind, minutes: u32, remaining: &TimeBuckets) -> bool {
    minutes <= remaining.for_kind(kind)
}

/// Friday: the week's points become next weekend's allowance.
pub fn is_settlement_day(date: NaiveDate) -> bool {
    date.weekday() == SETTLEMENT_DAY
}

/// Saturday or Sunday: leisure time may be spent.
pub fn is_usage_day(date: NaiveDate) -> bool {
    USAGE_DAYS.contains(&date.weekday())
}
