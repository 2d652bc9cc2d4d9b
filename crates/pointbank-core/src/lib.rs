//! # Pointbank Core Library
//!
//! Offline-first ledger of reward/penalty points and leisure-time usage for
//! a single student, with an optional remote replica.
//!
//! ## Architecture
//!
//! - **Record Store**: durable key/value persistence (SQLite) for records,
//!   ranking state, settings and sync bookkeeping
//! - **Rules Engine**: pure functions deriving weekly totals, leisure-time
//!   allowances and streak bonuses from the record set
//! - **Sync**: intent queue, connectivity-driven mode selection, queue
//!   draining and last-writer-wins merge against a remote record service
//! - **Ledger**: the write/read surface tying the pieces together
//!
//! ## Key Components
//!
//! - [`Ledger`]: validated writes and derived reads
//! - [`RecordStore`]: local persistence
//! - [`SyncManager`]: remote synchronization state machine
//! - [`Config`]: application configuration management

pub mod calendar;
pub mod error;
pub mod events;
pub mod ledger;
pub mod model;
pub mod owner_id;
pub mod rules;
pub mod storage;
pub mod sync;

pub use calendar::{Clock, ManualClock, SystemClock, WeekCalendar};
pub use error::{ConfigError, CoreError, PersistenceError, RemoteError, ValidationError};
pub use events::{LedgerEvent, Notifier};
pub use ledger::Ledger;
pub use model::{
    PointDetails, PointKind, PointRecord, ProgressKind, RankingState, Settings, TimeKind,
    TimeUsageRecord,
};
pub use owner_id::get_or_create_owner_id;
pub use rules::{AvailableTime, TimeBuckets, WeeklyStats};
pub use storage::{Config, RecordStore};
pub use sync::{SyncManager, SyncMode, SyncOutcome, SyncStatus};
