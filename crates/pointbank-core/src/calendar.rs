//! Clock abstraction and ISO week arithmetic.
//!
//! All "what week is it" questions go through a [`Clock`] and a
//! [`WeekCalendar`] so that week-boundary behavior can be exercised in tests
//! without waiting on the real calendar.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, Offset, Utc};

use crate::error::ValidationError;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Maps instants onto local calendar dates and ISO week numbers.
///
/// Weeks start on Monday and week 1 is the week containing the year's first
/// Thursday. Only the week-of-year index is exposed; the ISO year is not part
/// of the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekCalendar {
    offset: FixedOffset,
}

impl Default for WeekCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl WeekCalendar {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Calendar at a fixed offset east of UTC.
    pub fn with_offset_minutes(minutes: i32) -> Result<Self, ValidationError> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::new)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "calendar.utc_offset_minutes".into(),
                message: format!("{minutes} is outside the valid UTC offset range"),
            })
    }

    /// Calendar at the host's current UTC offset.
    pub fn local() -> Self {
        Self::new(*Local::now().offset())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    pub fn week_number(&self, instant: DateTime<Utc>) -> u32 {
        week_of_date(self.local_date(instant))
    }

    pub fn today(&self, clock: &dyn Clock) -> NaiveDate {
        self.local_date(clock.now())
    }

    pub fn current_week(&self, clock: &dyn Clock) -> u32 {
        self.week_number(clock.now())
    }
}

/// ISO-8601 week-of-year for a calendar date.
pub fn week_of_date(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn iso_week_boundaries() {
        // 2026-01-01 is a Thursday, so it anchors week 1
        assert_eq!(week_of_date(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()), 1);
        // Monday 2025-12-29 belongs to the same ISO week
        assert_eq!(week_of_date(NaiveDate::from_ymd_opt(2025, 12, 29).unwrap()), 1);
        // 2021-01-01 is a Friday and falls in week 53 of 2020
        assert_eq!(week_of_date(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()), 53);
        // Sunday closes the week, Monday opens the next one
        assert_eq!(week_of_date(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()), 42);
        assert_eq!(week_of_date(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()), 43);
    }

    #[test]
    fn offset_shifts_local_date() {
        // Sunday 23:30 UTC is already Monday in UTC+8
        let instant = Utc.with_ymd_and_hms(2026, 10, 18, 23, 30, 0).unwrap();
        let utc = WeekCalendar::utc();
        let east = WeekCalendar::with_offset_minutes(8 * 60).unwrap();
        assert_eq!(utc.week_number(instant), 42);
        assert_eq!(east.week_number(instant), 43);
    }

    #[test]
    fn rejects_out_of_range_offset() {
        assert!(WeekCalendar::with_offset_minutes(24 * 60).is_err());
    }

    #[test]
    fn manual_clock_moves_on_demand() {
        let start = Utc.with_ymd_and_hms(2026, 10, 12, 8, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let calendar = WeekCalendar::utc();
        assert_eq!(calendar.current_week(&clock), 42);

        clock.advance(Duration::days(7));
        assert_eq!(calendar.current_week(&clock), 43);

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
