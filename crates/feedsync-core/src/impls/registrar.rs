//! SyncRegistrar implementations.
//!
//! - `ChannelRegistrar`: in-process deferred sync; tags flow to the `SyncWorker`.
//! - `UnsupportedRegistrar`: host without background sync (manual retry only).

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::QueueKind;
use crate::error::RegistrationError;
use crate::ports::SyncRegistrar;

#[derive(Debug, Clone)]
pub struct ChannelRegistrar {
    tx: mpsc::UnboundedSender<QueueKind>,
}

impl ChannelRegistrar {
    /// Returns the registrar and the receiving end for the worker.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueueKind>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SyncRegistrar for ChannelRegistrar {
    async fn register(&self, queue: QueueKind) -> Result<(), RegistrationError> {
        self.tx.send(queue).map_err(|_| RegistrationError::Closed)?;
        debug!(%queue, "sync registered");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedRegistrar;

#[async_trait]
impl SyncRegistrar for UnsupportedRegistrar {
    async fn register(&self, _queue: QueueKind) -> Result<(), RegistrationError> {
        Err(RegistrationError::Unsupported)
    }
}
