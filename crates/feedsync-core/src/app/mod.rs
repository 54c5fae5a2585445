//! App - アプリケーション層
//!
//! ports を組み合わせてオフラインキューと同期処理を実装します。
//!
//! # 主要コンポーネント
//! - **QueueWriter**: アクションを queue に積み、sync を依頼
//! - **SyncTrigger**: deferred sync の登録（未対応なら false）
//! - **SyncProcessor**: queue を drain して API へ再送
//! - **RetryPolicy**: 指数バックオフ + jitter
//! - **CompletionNotifier**: drain 完了を全クライアントへ通知
//! - **SyncWorker**: 登録された queue を online 時に処理するループ
//! - **AppBuilder**: 全体のワイヤリング

pub mod builder;
pub mod connectivity;
pub mod notifier;
pub mod processor;
pub mod retry;
pub mod status;
pub mod trigger;
pub mod worker;
pub mod writer;

// 主要な型を再エクスポート
pub use self::builder::{AppBuilder, BuildError, OfflineSync};
pub use self::connectivity::ConnectivityMonitor;
pub use self::notifier::{ClientHandle, ClientRegistry, CompletionNotifier};
pub use self::processor::SyncProcessor;
pub use self::retry::{RetryPolicy, fetch_with_retry, retry_with_backoff};
pub use self::status::QueueStatus;
pub use self::trigger::SyncTrigger;
pub use self::worker::{BackgroundTask, SyncWorker};
pub use self::writer::{EnqueueOutcome, QueueWriter};
