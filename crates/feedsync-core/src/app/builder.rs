//! AppBuilder - OfflineSync の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - store / transport が未設定なら build() で BuildError を返す
//! - from_config() は設定の検証・DB オープン・URL 解析を起動時に済ませる
//! - 実行中に「設定が悪かった」と気づく経路を残さない

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

use crate::app::connectivity::ConnectivityMonitor;
use crate::app::notifier::{ClientHandle, ClientRegistry, CompletionNotifier};
use crate::app::processor::SyncProcessor;
use crate::app::retry::RetryPolicy;
use crate::app::status::QueueStatus;
use crate::app::trigger::SyncTrigger;
use crate::app::worker::{BackgroundTask, SyncWorker};
use crate::app::writer::{EnqueueOutcome, QueueWriter};
use crate::config::{ConfigError, SyncConfig};
use crate::domain::{DrainReport, QueueKind};
use crate::error::{StoreError, SyncError, TransportError};
use crate::impls::{ChannelRegistrar, HttpTransport, SqliteQueueStore, TracingEventSink, UnsupportedRegistrar};
use crate::observability::QueueCounts;
use crate::ports::{Clock, EventSink, QueueStore, ReplayTransport, SyncRegistrar, SystemClock};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no queue store configured")]
    MissingStore,

    #[error("no replay transport configured")]
    MissingTransport,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open queue store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to build transport: {0}")]
    Transport(#[from] TransportError),
}

/// AppBuilder は OfflineSync を構築
///
/// # 使用例
/// ```ignore
/// let sync = AppBuilder::new()
///     .store(Arc::new(InMemoryQueueStore::new()))
///     .transport(Arc::new(HttpTransport::new("http://localhost:3000", timeout)?))
///     .build()?;
/// ```
pub struct AppBuilder {
    store: Option<Arc<dyn QueueStore>>,
    transport: Option<Arc<dyn ReplayTransport>>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    platform_retry: RetryPolicy,
    background_sync: bool,
    connectivity: ConnectivityMonitor,
    rescan_interval: Option<Duration>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            transport: None,
            events: Arc::new(TracingEventSink),
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::default(),
            platform_retry: RetryPolicy::default(),
            background_sync: true,
            connectivity: ConnectivityMonitor::default(),
            rescan_interval: None,
        }
    }

    /// SQLite store + HTTP transport + policies from `config`.
    pub async fn from_config(config: &SyncConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let db_path = config.resolved_db_path()?;
        let store = SqliteQueueStore::open(&db_path).await?;
        let transport = HttpTransport::new(&config.api_base_url, config.request_timeout())?;
        info!(db = %db_path.display(), api = %config.api_base_url, "offline sync configured");

        Ok(Self::new()
            .store(Arc::new(store))
            .transport(Arc::new(transport))
            .retry_policy(config.retry.policy())
            .platform_retry(config.worker.platform_policy())
            .background_sync(config.background_sync)
            .rescan_interval(config.worker.probe_interval()))
    }

    pub fn store(mut self, store: Arc<dyn QueueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn ReplayTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Per-record network retry.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Rescheduling of whole syncs by the worker.
    pub fn platform_retry(mut self, policy: RetryPolicy) -> Self {
        self.platform_retry = policy;
        self
    }

    pub fn background_sync(mut self, enabled: bool) -> Self {
        self.background_sync = enabled;
        self
    }

    pub fn connectivity(mut self, connectivity: ConnectivityMonitor) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// How often the worker looks at the store for unregistered records.
    pub fn rescan_interval(mut self, every: Duration) -> Self {
        self.rescan_interval = Some(every);
        self
    }

    pub fn build(self) -> Result<OfflineSync, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let transport = self.transport.ok_or(BuildError::MissingTransport)?;

        let (registrar, tags) = if self.background_sync {
            let (registrar, rx) = ChannelRegistrar::new();
            let registrar: Arc<dyn SyncRegistrar> = Arc::new(registrar);
            (registrar, Some(rx))
        } else {
            let registrar: Arc<dyn SyncRegistrar> = Arc::new(UnsupportedRegistrar);
            (registrar, None)
        };

        let clients = Arc::new(ClientRegistry::new());
        let trigger = SyncTrigger::new(registrar);
        let writer = QueueWriter::new(
            Arc::clone(&store),
            trigger.clone(),
            Arc::clone(&self.events),
            self.clock,
        );
        let processor = Arc::new(SyncProcessor::new(
            Arc::clone(&store),
            transport,
            self.retry,
            CompletionNotifier::new(Arc::clone(&clients)),
            self.events,
        ));

        Ok(OfflineSync {
            store: Arc::clone(&store),
            writer,
            trigger,
            processor,
            clients,
            status: QueueStatus::new(store),
            connectivity: self.connectivity,
            platform_retry: self.platform_retry,
            rescan_interval: self.rescan_interval,
            tags,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The assembled offline queue: enqueue on one side, sync on the other.
pub struct OfflineSync {
    store: Arc<dyn QueueStore>,
    writer: QueueWriter,
    trigger: SyncTrigger,
    processor: Arc<SyncProcessor>,
    clients: Arc<ClientRegistry>,
    status: QueueStatus,
    connectivity: ConnectivityMonitor,
    platform_retry: RetryPolicy,
    rescan_interval: Option<Duration>,
    // worker 起動時に取り出す
    tags: Option<mpsc::UnboundedReceiver<QueueKind>>,
}

impl OfflineSync {
    pub fn writer(&self) -> &QueueWriter {
        &self.writer
    }

    pub fn trigger(&self) -> &SyncTrigger {
        &self.trigger
    }

    pub fn processor(&self) -> &Arc<SyncProcessor> {
        &self.processor
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    pub fn status(&self) -> &QueueStatus {
        &self.status
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub async fn enqueue<T: Serialize + ?Sized>(&self, queue: QueueKind, data: &T) -> EnqueueOutcome {
        self.writer.enqueue(queue, data).await
    }

    pub async fn connect_client(&self) -> ClientHandle {
        self.clients.connect().await
    }

    pub async fn counts(&self) -> Result<QueueCounts, StoreError> {
        self.status.counts().await
    }

    /// Manual retry: drain every queue now, in `QueueKind::ALL` order.
    pub async fn sync_all(&self) -> Vec<(QueueKind, Result<DrainReport, SyncError>)> {
        let mut results = Vec::with_capacity(QueueKind::ALL.len());
        for queue in QueueKind::ALL {
            results.push((queue, self.processor.drain(queue).await));
        }
        results
    }

    pub async fn sync(&self, queue: QueueKind) -> Result<DrainReport, SyncError> {
        self.processor.drain(queue).await
    }

    /// Drop every pending record of `queue`. Returns how many were removed.
    pub async fn clear(&self, queue: QueueKind) -> Result<u64, StoreError> {
        let removed = self.store.clear(queue).await?;
        info!(%queue, removed, "queue cleared");
        Ok(removed)
    }

    /// Start the background worker. Queues that already hold records are
    /// scheduled right away.
    ///
    /// The worker also rescans the store whenever connectivity returns (and
    /// every `rescan_interval`, if set), so records written without a
    /// registration, e.g. by another process, are replayed too.
    pub async fn start_worker(&mut self) -> Result<BackgroundTask, StoreError> {
        let leftovers: Vec<QueueKind> = self.status.counts().await?.non_empty().collect();
        let tags = match self.tags.take() {
            Some(rx) => rx,
            None => mpsc::unbounded_channel().1,
        };
        let mut worker = SyncWorker::new(
            Arc::clone(&self.processor),
            self.status.clone(),
            self.connectivity.clone(),
            self.platform_retry,
        );
        if let Some(every) = self.rescan_interval {
            worker = worker.rescan_every(every);
        }
        Ok(worker.spawn(tags, leftovers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Delivery, SyncMessage};
    use crate::impls::InMemoryQueueStore;
    use crate::testing::ScriptedTransport;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn build_without_store_fails() {
        let result = AppBuilder::new()
            .transport(Arc::new(ScriptedTransport::always(200)))
            .build();
        assert!(matches!(result, Err(BuildError::MissingStore)));
    }

    #[test]
    fn build_without_transport_fails() {
        let result = AppBuilder::new()
            .store(Arc::new(InMemoryQueueStore::new()))
            .build();
        assert!(matches!(result, Err(BuildError::MissingTransport)));
    }

    #[tokio::test]
    async fn from_config_rejects_invalid_url() {
        let config = SyncConfig {
            api_base_url: "mailto:someone".into(),
            ..SyncConfig::default()
        };
        assert!(matches!(
            AppBuilder::from_config(&config).await,
            Err(BuildError::Config(_))
        ));
    }

    #[tokio::test]
    async fn from_config_opens_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig {
            db_path: Some(dir.path().join("nested").join("queue.sqlite")),
            ..SyncConfig::default()
        };
        let sync = AppBuilder::from_config(&config).await.unwrap().build().unwrap();
        assert_eq!(sync.counts().await.unwrap().total(), 0);
        assert!(dir.path().join("nested").join("queue.sqlite").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_then_worker_delivers_and_notifies() {
        let store = Arc::new(InMemoryQueueStore::new());
        let transport = Arc::new(ScriptedTransport::always(201));
        let mut sync = AppBuilder::new()
            .store(store.clone())
            .transport(transport.clone())
            .build()
            .unwrap();
        let mut window = sync.connect_client().await;
        let worker = sync.start_worker().await.unwrap();

        let outcome = sync
            .enqueue(QueueKind::CommentCreate, &json!({"feedbackId": "abc", "content": "hi"}))
            .await;
        assert!(matches!(
            outcome,
            EnqueueOutcome::Queued {
                delivery: Delivery::Background,
                ..
            }
        ));

        assert_eq!(
            window.recv().await,
            Some(SyncMessage::BackgroundSyncComplete {
                queue: QueueKind::CommentCreate
            })
        );
        assert_eq!(store.count(QueueKind::CommentCreate).await.unwrap(), 0);
        assert_eq!(transport.requests().len(), 1);
        worker.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn without_background_sync_actions_wait_for_manual_retry() {
        let store = Arc::new(InMemoryQueueStore::new());
        let transport = Arc::new(ScriptedTransport::always(200));
        let sync = AppBuilder::new()
            .store(store.clone())
            .transport(transport.clone())
            .background_sync(false)
            .build()
            .unwrap();

        let outcome = sync.enqueue(QueueKind::UpvoteToggle, &json!({"feedbackId": "f"})).await;
        assert!(matches!(
            outcome,
            EnqueueOutcome::Queued {
                delivery: Delivery::Manual,
                ..
            }
        ));
        assert!(transport.requests().is_empty());

        let results = sync.sync_all().await;
        assert_eq!(results.len(), QueueKind::ALL.len());
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(sync.counts().await.unwrap().total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn leftovers_are_replayed_when_worker_starts() {
        let store = Arc::new(InMemoryQueueStore::new());
        store
            .add(QueueKind::Report, json!({"feedbackId": "f", "reason": "spam"}), 1)
            .await
            .unwrap();
        let transport = Arc::new(ScriptedTransport::always(200));
        let mut sync = AppBuilder::new()
            .store(store.clone())
            .transport(transport.clone())
            .background_sync(false)
            .build()
            .unwrap();

        let worker = sync.start_worker().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(store.count(QueueKind::Report).await.unwrap(), 0);
        worker.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn clear_drops_pending_records() {
        let store = Arc::new(InMemoryQueueStore::new());
        store.add(QueueKind::Report, json!({}), 1).await.unwrap();
        let sync = AppBuilder::new()
            .store(store)
            .transport(Arc::new(ScriptedTransport::always(200)))
            .build()
            .unwrap();

        assert_eq!(sync.clear(QueueKind::Report).await.unwrap(), 1);
        assert_eq!(sync.counts().await.unwrap().get(QueueKind::Report), 0);
    }
}
