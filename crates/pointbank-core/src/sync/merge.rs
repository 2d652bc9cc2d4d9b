//! Last-writer-wins merge of local and remote record sets.

use std::collections::BTreeMap;

use crate::model::SyncRecord;

/// Merge two record sets by id.
///
/// Local records go in first and remote records overwrite any local record
/// with the same id. The result holds the union of ids, newest first, with
/// the id breaking timestamp ties so the output is deterministic.
///
/// There are no tombstones: a record removed remotely but still present
/// locally survives the merge.
pub fn merge_records<T: SyncRecord>(local: Vec<T>, remote: Vec<T>) -> Vec<T> {
    let mut by_id: BTreeMap<String, T> = BTreeMap::new();
    for record in local.into_iter().chain(remote) {
        by_id.insert(record.id().to_string(), record);
    }

    let mut merged: Vec<T> = by_id.into_values().collect();
    merged.sort_by(|a, b| {
        b.timestamp()
            .cmp(&a.timestamp())
            .then_with(|| a.id().cmp(b.id()))
    });
    merged
}
