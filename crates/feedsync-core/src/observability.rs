use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::domain::QueueKind;

/// Pending records per queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: BTreeMap<QueueKind, u64>,
}

impl QueueCounts {
    pub fn get(&self, queue: QueueKind) -> u64 {
        self.pending.get(&queue).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.pending.values().sum()
    }

    /// Queues that still hold at least one record.
    pub fn non_empty(&self) -> impl Iterator<Item = QueueKind> + '_ {
        self.pending
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(queue, _)| *queue)
    }
}

/// Install the global `tracing` subscriber.
///
/// Filter comes from `RUST_LOG`, `info` otherwise. Calling this twice is harmless.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("logging initialized");
    }
}
