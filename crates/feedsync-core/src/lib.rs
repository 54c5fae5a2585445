//! feedsync-core
//!
//! Offline action queue for the feedback app: actions taken without a
//! connection are persisted per queue and replayed against the REST API
//! once connectivity returns.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（QueueKind, QueueRecord, route table, events, ids）
//! - **ports**: 抽象化レイヤー（QueueStore, ReplayTransport, SyncRegistrar, EventSink, Clock）
//! - **app**: アプリケーションロジック（writer, trigger, processor, retry, notifier, worker, builder）
//! - **impls**: 実装（SQLite / in-memory store, HTTP transport, registrars, event sinks）
//! - **config**: TOML + 環境変数による設定
//! - **observability**: ログ初期化と queue の件数
//! - **error**: エラー型

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;

#[cfg(test)]
mod testing;

pub use app::{AppBuilder, EnqueueOutcome, OfflineSync, RetryPolicy};
pub use config::SyncConfig;
pub use domain::{QueueKind, QueueRecord};
pub use error::SyncError;
