mod config;
pub mod backend;
pub mod record_store;
pub mod snapshot;

pub use backend::{MemoryBackend, SqliteBackend, StorageBackend};
pub use config::{CalendarConfig, Config, RemoteConfig};
pub use record_store::RecordStore;
pub use snapshot::{export_snapshot, export_to_file, import_from_file, import_snapshot};

use std::fmt;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Namespaced entries the record store keeps in its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    PointRecords,
    TimeRecords,
    CurrentRankings,
    WeeklyStats,
    Settings,
    SyncQueue,
    LastSyncTime,
}

impl StorageKey {
    pub const ALL: [StorageKey; 7] = [
        StorageKey::PointRecords,
        StorageKey::TimeRecords,
        StorageKey::CurrentRankings,
        StorageKey::WeeklyStats,
        StorageKey::Settings,
        StorageKey::SyncQueue,
        StorageKey::LastSyncTime,
    ];

    /// Backend key.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::PointRecords => "pointbank.point_records",
            StorageKey::TimeRecords => "pointbank.time_records",
            StorageKey::CurrentRankings => "pointbank.current_rankings",
            StorageKey::WeeklyStats => "pointbank.weekly_stats",
            StorageKey::Settings => "pointbank.settings",
            StorageKey::SyncQueue => "pointbank.sync_queue",
            StorageKey::LastSyncTime => "pointbank.last_sync_time",
        }
    }

    /// Top-level name used in export snapshots. Queue and sync bookkeeping
    /// are device-local and never exported.
    pub fn export_name(&self) -> Option<&'static str> {
        match self {
            StorageKey::PointRecords => Some("POINT_RECORDS"),
            StorageKey::TimeRecords => Some("TIME_RECORDS"),
            StorageKey::CurrentRankings => Some("CURRENT_RANKINGS"),
            StorageKey::WeeklyStats => Some("WEEKLY_STATS"),
            StorageKey::Settings => Some("SETTINGS"),
            StorageKey::SyncQueue | StorageKey::LastSyncTime => None,
        }
    }

    pub fn from_export_name(name: &str) -> Option<Self> {
        StorageKey::ALL
            .into_iter()
            .find(|key| key.export_name() == Some(name))
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `~/.config/pointbank[-dev]/` based on POINTBANK_ENV.
///
/// `POINTBANK_DATA_DIR` overrides the location entirely. Set
/// POINTBANK_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("POINTBANK_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .ok_or_else(|| ConfigError::DataDir("home directory not found".into()))?
                .join(".config");

            let env = std::env::var("POINTBANK_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pointbank-dev")
            } else {
                base_dir.join("pointbank")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}
