//! Events - キューが外へ知らせる出来事
//!
//! UI はこれを購読して toast などを描画します。core は表示方法を知りません。

use serde::{Deserialize, Serialize};

use super::{QueueKind, RecordId};

/// How an enqueued action will reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// A background sync was registered; the action will be replayed automatically.
    Background,
    /// Background sync is unavailable; the user has to retry manually.
    Manual,
}

/// Result of one drain pass over a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub queue: QueueKind,
    /// Records read in the initial scan.
    pub attempted: usize,
    /// Records delivered and deleted.
    pub delivered: usize,
    /// Records left in the store for the next pass.
    pub retained: usize,
}

impl DrainReport {
    pub fn empty(queue: QueueKind) -> Self {
        Self {
            queue,
            attempted: 0,
            delivered: 0,
            retained: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attempted == 0
    }
}

/// Terminal outcomes worth telling the user about.
///
/// Transient retries are not surfaced individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    Enqueued {
        queue: QueueKind,
        id: RecordId,
        delivery: Delivery,
    },
    EnqueueFailed {
        queue: QueueKind,
        reason: String,
    },
    SyncCompleted {
        queue: QueueKind,
        report: DrainReport,
    },
    SyncFailed {
        queue: QueueKind,
        reason: String,
    },
}

impl QueueEvent {
    pub fn queue(&self) -> QueueKind {
        match self {
            QueueEvent::Enqueued { queue, .. }
            | QueueEvent::EnqueueFailed { queue, .. }
            | QueueEvent::SyncCompleted { queue, .. }
            | QueueEvent::SyncFailed { queue, .. } => *queue,
        }
    }

    /// Short user-facing text (what a toast would say).
    pub fn message(&self) -> String {
        match self {
            QueueEvent::Enqueued {
                delivery: Delivery::Background,
                ..
            } => "You're offline. Your action will be processed automatically when you're back online."
                .to_string(),
            QueueEvent::Enqueued {
                delivery: Delivery::Manual,
                ..
            } => "You're offline. Your action was saved; retry it once you're back online.".to_string(),
            QueueEvent::EnqueueFailed { reason, .. } => {
                format!("Failed to save your action for later: {reason}")
            }
            QueueEvent::SyncCompleted { report, .. } => format!(
                "Synced {} of {} offline action(s)",
                report.delivered, report.attempted
            ),
            QueueEvent::SyncFailed { reason, .. } => format!("Background sync failed: {reason}"),
        }
    }
}

/// Message posted to every open client once a queue finished draining.
///
/// Wire form: `{"type":"BACKGROUND_SYNC_COMPLETE","queue":"<queueName>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncMessage {
    #[serde(rename = "BACKGROUND_SYNC_COMPLETE")]
    BackgroundSyncComplete { queue: QueueKind },
}
