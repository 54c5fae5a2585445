//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **SqliteQueueStore**: 永続キュー（本番用）
//! - **InMemoryQueueStore**: テスト・一時利用
//! - **HttpTransport**: reqwest による再送
//! - **ChannelRegistrar / UnsupportedRegistrar**: deferred sync
//! - **TracingEventSink / BroadcastEventSink**: 通知の出口

pub mod event_sinks;
pub mod http_transport;
pub mod memory_store;
pub mod registrar;
pub mod sqlite_store;

pub use self::event_sinks::{BroadcastEventSink, TeeEventSink, TracingEventSink};
pub use self::http_transport::HttpTransport;
pub use self::memory_store::InMemoryQueueStore;
pub use self::registrar::{ChannelRegistrar, UnsupportedRegistrar};
pub use self::sqlite_store::SqliteQueueStore;
