//! Ports - 抽象化レイヤー
//!
//! core が外部（永続ストア、REST API、deferred sync、UI 通知、時刻）に
//! 触れる境界を trait として定義します。実装は `impls` にあります。

pub mod clock;
pub mod event_sink;
pub mod queue_store;
pub mod sync_registrar;
pub mod transport;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::queue_store::QueueStore;
pub use self::sync_registrar::SyncRegistrar;
pub use self::transport::ReplayTransport;
