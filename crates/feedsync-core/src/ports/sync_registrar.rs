//! SyncRegistrar port - 「接続が戻ったらこの queue を処理して」という依頼
//!
//! 登録はレコードではなくリクエストです。いつ processor を起動するかは
//! registrar の向こう側（worker）が決めます。

use async_trait::async_trait;

use crate::domain::QueueKind;
use crate::error::RegistrationError;

#[async_trait]
pub trait SyncRegistrar: Send + Sync {
    /// Register `queue` as a sync tag.
    ///
    /// `RegistrationError::Unsupported` is a capability gap, not a failure.
    async fn register(&self, queue: QueueKind) -> Result<(), RegistrationError>;
}
