//! EventSink port - ユーザー向け通知の出口
//!
//! core は toast を直接出さず、QueueEvent を emit するだけです。
//! 描画は UI 側の購読者が担当します。

use crate::domain::QueueEvent;

/// Receives queue events. Emitting never fails the caller.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: QueueEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: QueueEvent) {}
}
