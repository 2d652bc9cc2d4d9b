//! JSON export and import of the user-facing entries.
//!
//! The export is one object keyed by logical name (`POINT_RECORDS`,
//! `TIME_RECORDS`, `CURRENT_RANKINGS`, `WEEKLY_STATS`, `SETTINGS`). Import
//! overwrites matching entries verbatim and ignores everything else.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::record_store::RecordStore;
use super::StorageKey;
use crate::error::{CoreError, ValidationError};

pub fn export_snapshot(store: &RecordStore) -> Result<Value, CoreError> {
    let mut out = Map::new();
    for key in StorageKey::ALL {
        if let Some(name) = key.export_name() {
            out.insert(name.to_string(), store.raw_entry(key)?.unwrap_or(Value::Null));
        }
    }
    Ok(Value::Object(out))
}

/// Apply an exported snapshot. Returns the names that were written.
///
/// `null` values leave the existing entry untouched.
pub fn import_snapshot(store: &RecordStore, snapshot: &Value) -> Result<Vec<String>, CoreError> {
    let object = snapshot
        .as_object()
        .ok_or_else(|| ValidationError::InvalidValue {
            field: "snapshot".into(),
            message: "expected a JSON object at the top level".into(),
        })?;

    let mut applied = Vec::new();
    for (name, value) in object {
        match StorageKey::from_export_name(name) {
            Some(key) if !value.is_null() => {
                store.put_raw_entry(key, value)?;
                applied.push(name.clone());
            }
            Some(_) => {}
            None => warn!(name = %name, "ignoring unknown snapshot key"),
        }
    }
    info!(entries = applied.len(), "snapshot imported");
    Ok(applied)
}

pub fn export_to_file(store: &RecordStore, path: &Path) -> Result<(), CoreError> {
    let snapshot = export_snapshot(store)?;
    std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
    Ok(())
}

pub fn import_from_file(store: &RecordStore, path: &Path) -> Result<Vec<String>, CoreError> {
    let content = std::fs::read_to_string(path)?;
    let snapshot: Value = serde_json::from_str(&content)?;
    import_snapshot(store, &snapshot)
}
