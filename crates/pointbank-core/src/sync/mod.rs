//! Offline-first synchronization layer.
//!
//! Local writes are always durable first. In hybrid mode they are also queued
//! as intents and drained against a remote record service; reads may pull
//! and merge the remote record sets into the local store.

pub mod connectivity;
pub mod http;
pub mod merge;
pub mod remote;
pub mod sync_manager;
pub mod sync_queue;
pub mod types;

#[cfg(test)]
mod merge_tests;

pub use connectivity::{ConnectivityProbe, ManualConnectivity, TcpConnectivity};
pub use http::HttpRemote;
pub use merge::merge_records;
pub use remote::{MemoryRemote, RemoteAdapter, RemoteCollection, OWNER_FIELD};
pub use sync_manager::{SyncManager, DEFAULT_REMOTE_TIMEOUT};
pub use sync_queue::SyncQueue;
pub use types::{
    SkipReason, SyncAction, SyncContext, SyncIntent, SyncMode, SyncOutcome, SyncReport,
    SyncStatus, SyncTarget,
};
