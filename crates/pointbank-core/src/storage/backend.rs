//! Key/value backends behind the record store.
//!
//! Provides:
//! - SQLite-backed entries (file or in-memory), committed before `put` returns
//! - An in-memory map with a switchable outage flag for failure injection

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection};

use super::data_dir;
use crate::error::{CoreError, PersistenceError};

/// Durable string entries addressed by namespaced key.
///
/// Every call is synchronous: when `put` returns `Ok`, the value is durable.
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Write several entries at once. Either all of them land or none do.
    fn put_many(&self, entries: &[(&str, &str)]) -> Result<(), PersistenceError>;

    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// SQLite database holding a single `kv` table.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open the database at `~/.config/pointbank/pointbank.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open_default() -> Result<Self, CoreError> {
        let path = data_dir()?.join("pointbank.db");
        Ok(Self::open(&path)?)
    }

    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path).map_err(|source| PersistenceError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let backend = Self {
            conn: Mutex::new(conn),
        };
        backend.migrate()?;
        Ok(backend)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let backend = Self {
            conn: Mutex::new(conn),
        };
        backend.migrate()?;
        Ok(backend)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn
            .lock()
            .map_err(|_| PersistenceError::Unavailable("connection mutex poisoned".into()))
    }

    fn migrate(&self) -> Result<(), PersistenceError> {
        self.conn()?.execute_batch(
            "PRAGMA synchronous = FULL;

            CREATE TABLE IF NOT EXISTS kv (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );",
        )?;
        Ok(())
    }
}

impl StorageBackend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at)
             VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
            params![key, value],
        )?;
        Ok(())
    }

    fn put_many(&self, entries: &[(&str, &str)]) -> Result<(), PersistenceError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT OR REPLACE INTO kv (key, value, updated_at)
                 VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Volatile backend. `set_unavailable(true)` makes every call fail the way
/// an unreachable or full medium would.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, PersistenceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory backend offline".into()));
        }
        Ok(self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn put_many(&self, entries: &[(&str, &str)]) -> Result<(), PersistenceError> {
        let mut map = self.entries()?;
        for (key, value) in entries {
            map.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.entries()?.remove(key);
        Ok(())
    }
}
