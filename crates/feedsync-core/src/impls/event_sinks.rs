//! EventSink implementations.

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::domain::QueueEvent;
use crate::ports::EventSink;

/// Logs every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: QueueEvent) {
        let queue = event.queue();
        match &event {
            QueueEvent::EnqueueFailed { .. } | QueueEvent::SyncFailed { .. } => {
                warn!(%queue, message = %event.message(), "queue event");
            }
            _ => info!(%queue, message = %event.message(), "queue event"),
        }
    }
}

/// Fans events out to UI subscribers.
///
/// Events emitted while nobody listens are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<QueueEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: QueueEvent) {
        let _ = self.tx.send(event);
    }
}

/// Sends each event to two sinks.
pub struct TeeEventSink<A, B> {
    first: A,
    second: B,
}

impl<A: EventSink, B: EventSink> TeeEventSink<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: EventSink, B: EventSink> EventSink for TeeEventSink<A, B> {
    fn emit(&self, event: QueueEvent) {
        self.first.emit(event.clone());
        self.second.emit(event);
    }
}
