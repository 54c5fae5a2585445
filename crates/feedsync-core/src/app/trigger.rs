//! SyncTrigger - deferred sync の登録

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::QueueKind;
use crate::error::RegistrationError;
use crate::ports::SyncRegistrar;

#[derive(Clone)]
pub struct SyncTrigger {
    registrar: Arc<dyn SyncRegistrar>,
}

impl SyncTrigger {
    pub fn new(registrar: Arc<dyn SyncRegistrar>) -> Self {
        Self { registrar }
    }

    /// Ask for `queue` to be processed once connectivity allows.
    ///
    /// Returns whether the registration took. A missing facility is a
    /// capability gap and yields `false`, never an error.
    pub async fn request_sync(&self, queue: QueueKind) -> bool {
        match self.registrar.register(queue).await {
            Ok(()) => true,
            Err(RegistrationError::Unsupported) => {
                debug!(%queue, "background sync unsupported");
                false
            }
            Err(err) => {
                warn!(%queue, error = %err, "sync registration failed");
                false
            }
        }
    }
}
