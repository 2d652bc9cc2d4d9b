// Owner identity for remote rows
// Format: "student-<uuid>", stored once in settings

use tracing::info;
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::storage::RecordStore;

const OWNER_ID_PREFIX: &str = "student-";

/// Get the owner id from settings, creating and saving one if missing.
///
/// An existing non-empty id is kept as is, whatever its format.
pub fn get_or_create_owner_id(store: &RecordStore) -> Result<String, PersistenceError> {
    let mut settings = store.settings()?;
    if let Some(id) = settings
        .student_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        return Ok(id.to_string());
    }

    let id = format!("{}{}", OWNER_ID_PREFIX, Uuid::new_v4());
    settings.student_id = Some(id.clone());
    store.set_settings(&settings)?;
    info!(owner_id = %id, "created owner id");
    Ok(id)
}
