//! Status - queue ごとの未送信件数

use std::sync::Arc;

use crate::domain::QueueKind;
use crate::error::StoreError;
use crate::observability::QueueCounts;
use crate::ports::QueueStore;

#[derive(Clone)]
pub struct QueueStatus {
    store: Arc<dyn QueueStore>,
}

impl QueueStatus {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    pub async fn pending(&self, queue: QueueKind) -> Result<u64, StoreError> {
        self.store.count(queue).await
    }

    /// Counts for every known queue, including empty ones.
    pub async fn counts(&self) -> Result<QueueCounts, StoreError> {
        let mut counts = QueueCounts::default();
        for queue in QueueKind::ALL {
            counts.pending.insert(queue, self.store.count(queue).await?);
        }
        Ok(counts)
    }
}
