//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{QueueEvent, QueueKind, QueueRecord, RecordId, ReplayRequest};
use crate::error::{StoreError, TransportError};
use crate::ports::{EventSink, QueueStore, ReplayTransport};

/// Collects every emitted event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<QueueEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: QueueEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A store whose every operation fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

fn unavailable() -> StoreError {
    StoreError::Unavailable("disk is gone".into())
}

#[async_trait]
impl QueueStore for FailingStore {
    async fn add(&self, _: QueueKind, _: serde_json::Value, _: i64) -> Result<RecordId, StoreError> {
        Err(unavailable())
    }

    async fn get_all(&self, _: QueueKind) -> Result<Vec<QueueRecord>, StoreError> {
        Err(unavailable())
    }

    async fn delete(&self, _: QueueKind, _: RecordId) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn count(&self, _: QueueKind) -> Result<u64, StoreError> {
        Err(unavailable())
    }

    async fn clear(&self, _: QueueKind) -> Result<u64, StoreError> {
        Err(unavailable())
    }
}

/// Answers with scripted status codes, then `fallback` once the script runs out.
/// Records every request it sees.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<u16>>,
    fallback: u16,
    seen: Mutex<Vec<ReplayRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = u16>, fallback: u16) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn always(status: u16) -> Self {
        Self::new([], status)
    }

    pub fn requests(&self) -> Vec<ReplayRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplayTransport for ScriptedTransport {
    async fn send(&self, request: &ReplayRequest) -> Result<u16, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        let status = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        if (200..300).contains(&status) {
            Ok(status)
        } else {
            Err(TransportError::Status {
                method: request.method.as_str(),
                path: request.path(),
                status,
            })
        }
    }
}
