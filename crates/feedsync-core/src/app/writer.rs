//! QueueWriter - オフライン時のアクションを永続キューへ積む
//!
//! 呼び出し側には例外を返しません。結果はすべて QueueEvent で通知します。

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::app::trigger::SyncTrigger;
use crate::domain::{Delivery, QueueEvent, QueueKind, RecordId};
use crate::ports::{Clock, EventSink, QueueStore};

/// What happened to an enqueue call. Callers are free to ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued { id: RecordId, delivery: Delivery },
    /// The action could not be stored and is lost.
    Failed,
}

#[derive(Clone)]
pub struct QueueWriter {
    store: Arc<dyn QueueStore>,
    trigger: SyncTrigger,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl QueueWriter {
    pub fn new(
        store: Arc<dyn QueueStore>,
        trigger: SyncTrigger,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            trigger,
            events,
            clock,
        }
    }

    /// Append `data` to `queue` and request a background sync.
    pub async fn enqueue<T: Serialize + ?Sized>(&self, queue: QueueKind, data: &T) -> EnqueueOutcome {
        let payload = match serde_json::to_value(data) {
            Ok(v) => v,
            Err(err) => return self.fail(queue, err.to_string()),
        };

        let id = match self.store.add(queue, payload, self.clock.now_millis()).await {
            Ok(id) => id,
            Err(err) => return self.fail(queue, err.to_string()),
        };

        let delivery = if self.trigger.request_sync(queue).await {
            Delivery::Background
        } else {
            Delivery::Manual
        };
        info!(%queue, record_id = %id, ?delivery, "offline action queued");

        self.events.emit(QueueEvent::Enqueued {
            queue,
            id,
            delivery,
        });
        EnqueueOutcome::Queued { id, delivery }
    }

    fn fail(&self, queue: QueueKind, reason: String) -> EnqueueOutcome {
        warn!(%queue, %reason, "failed to queue offline action");
        self.events.emit(QueueEvent::EnqueueFailed { queue, reason });
        EnqueueOutcome::Failed
    }
}
