//! Tests for merge module.

#[cfg(test)]
mod tests {
    use super::super::merge::*;
    use crate::model::{TimeKind, TimeUsageRecord};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 10, 10, 0, 0).unwrap()
    }

    fn record(id: &str, minutes: u32, offset_min: i64) -> TimeUsageRecord {
        TimeUsageRecord {
            id: id.to_string(),
            kind: TimeKind::Game,
            minutes,
            description: String::new(),
            timestamp: base() + Duration::minutes(offset_min),
        }
    }

    #[test]
    fn union_of_ids_newest_first() {
        let local = vec![record("a", 10, 0), record("b", 20, 5)];
        let remote = vec![record("c", 30, 10)];

        let merged = merge_records(local, remote);
        let ids: Vec<_> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn remote_wins_even_when_older() {
        let local = vec![record("a", 10, 30)];
        let remote = vec![record("a", 99, 0)];

        let merged = merge_records(local, remote);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].minutes, 99);
    }

    #[test]
    fn timestamp_ties_break_by_id() {
        let local = vec![record("z", 1, 0), record("m", 1, 0)];
        let merged = merge_records(local, vec![record("a", 1, 0)]);
        let ids: Vec<_> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }

    #[test]
    fn local_only_records_survive() {
        let merged = merge_records(vec![record("local", 5, 0)], Vec::new());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "local");
    }

    #[test]
    fn merge_is_idempotent() {
        let local = vec![record("a", 10, 0), record("b", 20, 5)];
        let remote = vec![record("b", 25, 5), record("c", 30, 1)];

        let once = merge_records(local, remote.clone());
        let twice = merge_records(once.clone(), remote);
        assert_eq!(once, twice);
    }
}
