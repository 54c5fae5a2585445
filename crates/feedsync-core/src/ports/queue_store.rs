//! QueueStore port - オフラインアクションの永続ストア
//!
//! queue ごとに独立した store を持ちます（`offline-<queueName>`）。
//!
//! # 設計原則
//! - store にあるのは「配送待ち」のレコードだけ
//! - レコードは add と delete のみ（in-place 更新しない）
//! - 単一レコード単位で atomic、レコードを跨ぐトランザクションはない

use async_trait::async_trait;

use crate::domain::{QueueKind, QueueRecord, RecordId};
use crate::error::StoreError;

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append a record, creating the store on first write. Returns the assigned key.
    async fn add(
        &self,
        queue: QueueKind,
        data: serde_json::Value,
        timestamp: i64,
    ) -> Result<RecordId, StoreError>;

    /// Full scan in insertion order. A store that was never written reads as empty.
    async fn get_all(&self, queue: QueueKind) -> Result<Vec<QueueRecord>, StoreError>;

    /// Delete one record. Deleting a missing key is a no-op.
    async fn delete(&self, queue: QueueKind, id: RecordId) -> Result<(), StoreError>;

    async fn count(&self, queue: QueueKind) -> Result<u64, StoreError>;

    /// Drop every record in one queue. Returns how many were removed.
    async fn clear(&self, queue: QueueKind) -> Result<u64, StoreError>;
}
