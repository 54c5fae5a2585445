//! In-memory queue store.
//!
//! Same contract as the SQLite store, without durability. Used by tests and by
//! hosts that only need the queue for the lifetime of the process.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{QueueKind, QueueRecord, RecordId};
use crate::error::StoreError;
use crate::ports::QueueStore;

/// One queue's records. Keys are never reused.
#[derive(Debug, Default)]
struct StoreState {
    next_id: i64,
    records: BTreeMap<RecordId, QueueRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryQueueStore {
    // store は初回 add で作られる（SQLite 版の lazy create と同じ）
    stores: Arc<Mutex<HashMap<QueueKind, StoreState>>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn add(
        &self,
        queue: QueueKind,
        data: serde_json::Value,
        timestamp: i64,
    ) -> Result<RecordId, StoreError> {
        let mut stores = self.stores.lock().await;
        let store = stores.entry(queue).or_default();
        store.next_id += 1;
        let id = RecordId::new(store.next_id);
        store
            .records
            .insert(id, QueueRecord::new(id, data, timestamp));
        Ok(id)
    }

    async fn get_all(&self, queue: QueueKind) -> Result<Vec<QueueRecord>, StoreError> {
        let stores = self.stores.lock().await;
        Ok(stores
            .get(&queue)
            .map(|s| s.records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, queue: QueueKind, id: RecordId) -> Result<(), StoreError> {
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get_mut(&queue) {
            store.records.remove(&id);
        }
        Ok(())
    }

    async fn count(&self, queue: QueueKind) -> Result<u64, StoreError> {
        let stores = self.stores.lock().await;
        Ok(stores.get(&queue).map_or(0, |s| s.records.len() as u64))
    }

    async fn clear(&self, queue: QueueKind) -> Result<u64, StoreError> {
        let mut stores = self.stores.lock().await;
        let Some(store) = stores.get_mut(&queue) else {
            return Ok(0);
        };
        let removed = store.records.len() as u64;
        store.records.clear();
        Ok(removed)
    }
}
