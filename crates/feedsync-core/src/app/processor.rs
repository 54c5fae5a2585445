//! SyncProcessor - queue を drain してレコードを API へ再送する
//!
//! # フロー（1 回の起動）
//! 1. tag を QueueKind に解決（認識できない tag は無視）
//! 2. store を full scan（空なら何もせず終了）
//! 3. レコードごとに route → retry 付きで送信 → 成功したら delete
//! 4. 全レコードを試したら完了をクライアントへ broadcast
//!
//! レコード単位の失敗でバッチは止めません。失敗したレコードは store に残り、
//! 次回の sync で再送されます。scan 自体の失敗だけを呼び出し側に返します。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::app::notifier::CompletionNotifier;
use crate::app::retry::{RetryPolicy, fetch_with_retry};
use crate::domain::{DrainReport, QueueEvent, QueueKind, QueueRecord, RouteError, SyncRunId};
use crate::error::{SyncError, TransportError};
use crate::ports::{EventSink, QueueStore, ReplayTransport};

#[derive(Debug, thiserror::Error)]
enum ReplayError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub struct SyncProcessor {
    store: Arc<dyn QueueStore>,
    transport: Arc<dyn ReplayTransport>,
    policy: RetryPolicy,
    notifier: CompletionNotifier,
    events: Arc<dyn EventSink>,
    // 同じ queue の drain を直列化する（別 queue は独立）
    locks: HashMap<QueueKind, Arc<Mutex<()>>>,
}

impl SyncProcessor {
    pub fn new(
        store: Arc<dyn QueueStore>,
        transport: Arc<dyn ReplayTransport>,
        policy: RetryPolicy,
        notifier: CompletionNotifier,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let locks = QueueKind::ALL
            .into_iter()
            .map(|kind| (kind, Arc::new(Mutex::new(()))))
            .collect();
        Self {
            store,
            transport,
            policy,
            notifier,
            events,
            locks,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Entry point for a sync tag. Unrecognized tags are ignored (`Ok(None)`).
    pub async fn handle_tag(&self, tag: &str) -> Result<Option<DrainReport>, SyncError> {
        let Some(queue) = QueueKind::from_tag(tag) else {
            debug!(tag, "ignoring unrecognized sync tag");
            return Ok(None);
        };
        self.drain(queue).await.map(Some)
    }

    /// Drain one queue.
    ///
    /// Returns `Err` only when the store cannot be read; the caller should
    /// reschedule the whole sync in that case.
    pub async fn drain(&self, queue: QueueKind) -> Result<DrainReport, SyncError> {
        let run = SyncRunId::generate();
        self.drain_inner(queue)
            .instrument(info_span!("drain", %queue, %run))
            .await
    }

    async fn drain_inner(&self, queue: QueueKind) -> Result<DrainReport, SyncError> {
        let lock = self.lock_for(queue);
        let _guard = lock.lock().await;

        let records = match self.store.get_all(queue).await {
            Ok(records) => records,
            Err(source) => {
                warn!(error = %source, "queue scan failed");
                self.events.emit(QueueEvent::SyncFailed {
                    queue,
                    reason: source.to_string(),
                });
                return Err(SyncError::Drain { queue, source });
            }
        };

        if records.is_empty() {
            debug!("queue empty, nothing to sync");
            return Ok(DrainReport::empty(queue));
        }

        let mut report = DrainReport {
            queue,
            attempted: records.len(),
            delivered: 0,
            retained: 0,
        };

        for record in &records {
            if self.deliver(queue, record).await {
                report.delivered += 1;
            } else {
                report.retained += 1;
            }
        }

        info!(
            attempted = report.attempted,
            delivered = report.delivered,
            retained = report.retained,
            "queue drained"
        );
        self.notifier.notify_queue_complete(queue).await;
        self.events.emit(QueueEvent::SyncCompleted { queue, report });
        Ok(report)
    }

    /// Replay and delete one record. `false` leaves it in the store.
    async fn deliver(&self, queue: QueueKind, record: &QueueRecord) -> bool {
        if let Err(err) = self.replay(queue, record).await {
            warn!(record_id = %record.id, error = %err, "record kept for next sync");
            return false;
        }

        // 送信済みでも delete に失敗したら次回また送られる（at-least-once）
        match self.store.delete(queue, record.id).await {
            Ok(()) => {
                debug!(record_id = %record.id, "record delivered");
                true
            }
            Err(err) => {
                warn!(record_id = %record.id, error = %err, "delivered but delete failed");
                false
            }
        }
    }

    async fn replay(&self, queue: QueueKind, record: &QueueRecord) -> Result<u16, ReplayError> {
        let request = queue.route(&record.data)?;
        let status = fetch_with_retry(&self.policy, self.transport.as_ref(), &request).await?;
        Ok(status)
    }

    fn lock_for(&self, queue: QueueKind) -> Arc<Mutex<()>> {
        match self.locks.get(&queue) {
            Some(lock) => Arc::clone(lock),
            // ALL から作っているので来ないが、来ても直列化しないだけ
            None => Arc::new(Mutex::new(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::notifier::ClientRegistry;
    use crate::domain::{HttpMethod, ReplayRequest, SyncMessage};
    use crate::impls::InMemoryQueueStore;
    use crate::testing::{FailingStore, RecordingSink, ScriptedTransport};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    struct Fixture {
        store: Arc<InMemoryQueueStore>,
        transport: Arc<ScriptedTransport>,
        clients: Arc<ClientRegistry>,
        sink: Arc<RecordingSink>,
        processor: SyncProcessor,
    }

    fn fixture(transport: ScriptedTransport) -> Fixture {
        let store = Arc::new(InMemoryQueueStore::new());
        let transport = Arc::new(transport);
        let clients = Arc::new(ClientRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        let processor = SyncProcessor::new(
            store.clone(),
            transport.clone(),
            RetryPolicy::default(),
            CompletionNotifier::new(Arc::clone(&clients)),
            sink.clone(),
        );
        Fixture {
            store,
            transport,
            clients,
            sink,
            processor,
        }
    }

    #[tokio::test]
    async fn comment_is_replayed_deleted_and_announced() {
        let fx = fixture(ScriptedTransport::always(201));
        let mut window = fx.clients.connect().await;
        fx.store
            .add(QueueKind::CommentCreate, json!({"feedbackId": "abc", "content": "nice"}), 1)
            .await
            .unwrap();

        let report = fx
            .processor
            .handle_tag("comment-create-queue")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.retained, 0);
        assert_eq!(
            fx.transport.requests(),
            vec![ReplayRequest {
                method: HttpMethod::Post,
                segments: vec!["api".into(), "feedback".into(), "abc".into(), "comments".into()],
                body: json!({"content": "nice"}),
            }]
        );
        assert_eq!(fx.store.count(QueueKind::CommentCreate).await.unwrap(), 0);
        assert_eq!(
            window.recv().await,
            Some(SyncMessage::BackgroundSyncComplete {
                queue: QueueKind::CommentCreate
            })
        );
        assert!(matches!(
            fx.sink.events().as_slice(),
            [QueueEvent::SyncCompleted { .. }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_then_record_removed() {
        let fx = fixture(ScriptedTransport::new([500, 500], 200));
        fx.store
            .add(QueueKind::Report, json!({"feedbackId": "x", "reason": "spam"}), 1)
            .await
            .unwrap();

        let start = Instant::now();
        let report = fx.processor.drain(QueueKind::Report).await.unwrap();

        assert_eq!(fx.transport.requests().len(), 3);
        assert_eq!(report.delivered, 1);
        assert_eq!(fx.store.count(QueueKind::Report).await.unwrap(), 0);
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(5));
        // 一時的な失敗はユーザーに見せない
        assert!(
            !fx.sink
                .events()
                .iter()
                .any(|e| matches!(e, QueueEvent::SyncFailed { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_record_is_retained_unchanged() {
        let fx = fixture(ScriptedTransport::always(503));
        let id = fx
            .store
            .add(QueueKind::UpvoteToggle, json!({"feedbackId": "f1"}), 1234)
            .await
            .unwrap();

        let report = fx.processor.drain(QueueKind::UpvoteToggle).await.unwrap();

        assert_eq!(report.retained, 1);
        assert_eq!(fx.transport.requests().len(), 4);
        let kept = fx.store.get_all(QueueKind::UpvoteToggle).await.unwrap();
        assert_eq!(
            kept,
            vec![QueueRecord::new(id, json!({"feedbackId": "f1"}), 1234)]
        );
    }

    #[tokio::test]
    async fn unroutable_record_does_not_abort_the_batch() {
        let fx = fixture(ScriptedTransport::always(200));
        fx.store
            .add(QueueKind::Report, json!({"reason": "no id"}), 1)
            .await
            .unwrap();
        fx.store
            .add(QueueKind::Report, json!({"feedbackId": "ok", "reason": "spam"}), 2)
            .await
            .unwrap();

        let report = fx.processor.drain(QueueKind::Report).await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.retained, 1);
        // route できないレコードは送信しない
        assert_eq!(fx.transport.requests().len(), 1);
        let left = fx.store.get_all(QueueKind::Report).await.unwrap();
        assert_eq!(left[0].data, json!({"reason": "no id"}));
    }

    #[tokio::test]
    async fn empty_queue_is_a_silent_noop() {
        let fx = fixture(ScriptedTransport::always(200));
        let mut window = fx.clients.connect().await;

        let report = fx.processor.drain(QueueKind::FeedbackCreate).await.unwrap();

        assert!(report.is_empty());
        assert!(fx.transport.requests().is_empty());
        assert!(window.try_recv().is_none());
        assert!(fx.sink.events().is_empty());
    }

    #[tokio::test]
    async fn draining_one_queue_leaves_others_alone() {
        let fx = fixture(ScriptedTransport::always(200));
        fx.store
            .add(QueueKind::CommentCreate, json!({"feedbackId": "a", "content": "c"}), 1)
            .await
            .unwrap();
        fx.store
            .add(QueueKind::UpvoteToggle, json!({"feedbackId": "a"}), 1)
            .await
            .unwrap();

        fx.processor.drain(QueueKind::CommentCreate).await.unwrap();

        assert_eq!(fx.store.count(QueueKind::CommentCreate).await.unwrap(), 0);
        assert_eq!(fx.store.count(QueueKind::UpvoteToggle).await.unwrap(), 1);
        assert!(
            fx.transport
                .requests()
                .iter()
                .all(|r| r.segments.last().map(String::as_str) == Some("comments"))
        );
    }

    #[tokio::test]
    async fn unknown_tags_are_ignored() {
        let fx = fixture(ScriptedTransport::always(200));
        assert!(fx.processor.handle_tag("workbox-precache").await.unwrap().is_none());
        assert!(fx.processor.handle_tag("feedback-delete-queue").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scan_failure_propagates() {
        let sink = Arc::new(RecordingSink::default());
        let processor = SyncProcessor::new(
            Arc::new(FailingStore),
            Arc::new(ScriptedTransport::always(200)),
            RetryPolicy::default(),
            CompletionNotifier::new(Arc::new(ClientRegistry::new())),
            sink.clone(),
        );

        let err = processor.drain(QueueKind::Report).await.unwrap_err();
        assert!(matches!(err, SyncError::Drain { queue: QueueKind::Report, .. }));
        assert!(matches!(
            sink.events().as_slice(),
            [QueueEvent::SyncFailed { queue: QueueKind::Report, .. }]
        ));
    }

    struct SlowTransport {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ReplayTransport for SlowTransport {
        async fn send(&self, _request: &ReplayRequest) -> Result<u16, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(200)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_drains_of_one_queue_do_not_double_submit() {
        let store = Arc::new(InMemoryQueueStore::new());
        let transport = Arc::new(SlowTransport {
            calls: AtomicU32::new(0),
        });
        let processor = SyncProcessor::new(
            store.clone(),
            transport.clone(),
            RetryPolicy::default(),
            CompletionNotifier::new(Arc::new(ClientRegistry::new())),
            Arc::new(RecordingSink::default()),
        );
        for n in 0..2 {
            store
                .add(QueueKind::UpvoteToggle, json!({"feedbackId": format!("f{n}")}), n)
                .await
                .unwrap();
        }

        let (a, b) = tokio::join!(
            processor.drain(QueueKind::UpvoteToggle),
            processor.drain(QueueKind::UpvoteToggle)
        );

        assert_eq!(a.unwrap().delivered + b.unwrap().delivered, 2);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }
}
