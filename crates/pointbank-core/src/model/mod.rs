//! Domain records owned by the record store.

pub mod records;

pub use records::{
    PointDetails, PointKind, PointRecord, ProgressKind, RankingState, Settings, SyncRecord,
    TimeKind, TimeUsageRecord,
};
