use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::{PointKind, PointRecord, TimeKind, TimeUsageRecord};

/// Capacity of the notification channel. Slow receivers lag and lose the
/// oldest events.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Emitted after a successful local commit.
///
/// Delivery is immediate and at-most-once. Nothing is persisted or replayed:
/// a receiver subscribed after an event fired never sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    PointsChanged {
        delta: i64,
        kind: PointKind,
        record: PointRecord,
    },
    TimeChanged {
        minutes: u32,
        kind: TimeKind,
        record: TimeUsageRecord,
    },
}

impl LedgerEvent {
    pub fn points_changed(record: &PointRecord) -> Self {
        LedgerEvent::PointsChanged {
            delta: record.value,
            kind: record.kind,
            record: record.clone(),
        }
    }

    pub fn time_changed(record: &TimeUsageRecord) -> Self {
        LedgerEvent::TimeChanged {
            minutes: record.minutes,
            kind: record.kind,
            record: record.clone(),
        }
    }
}

/// Fire-and-forget sender owned by the write path.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<LedgerEvent>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    /// Send to current subscribers. Having none is not an error.
    pub fn emit(&self, event: LedgerEvent) {
        let _ = self.sender.send(event);
    }
}
