//! SyncWorker - deferred sync を実行するバックグラウンドループ
//!
//! # 責務
//! - SyncRegistrar 経由で登録された queue を受け取る
//! - offline の間は溜めておき、online になったらまとめて drain する
//! - drain が失敗したら（store が読めない等）自前の backoff で再スケジュールする
//! - online に戻った時（と、設定があれば定期的に）store を見直し、登録のない queue も拾う
//! - shutdown は watch で通知。実行中の drain は最後まで走らせる
//!
//! 同じ queue の登録は pending 中にまとめられます（1 回の drain で全件を処理するため）。

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::app::connectivity::ConnectivityMonitor;
use crate::app::processor::SyncProcessor;
use crate::app::retry::RetryPolicy;
use crate::app::status::QueueStatus;
use crate::domain::{DrainReport, QueueKind};
use crate::error::SyncError;

/// Handle for a spawned loop.
/// - `request_shutdown()` で停止を依頼（実行中の処理は中断しない）
/// - handle を drop してもループは止まる
pub struct BackgroundTask {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl BackgroundTask {
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(body(shutdown_rx));
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // receiver may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(err) = self.join.await {
            error!(error = %err, "background task panicked");
        }
    }
}

pub struct SyncWorker {
    processor: Arc<SyncProcessor>,
    status: QueueStatus,
    connectivity: ConnectivityMonitor,
    platform_retry: RetryPolicy,
    rescan_every: Option<Duration>,
}

enum Step {
    Drained(QueueKind, Result<DrainReport, SyncError>),
    RetryDue(QueueKind),
}

impl SyncWorker {
    pub fn new(
        processor: Arc<SyncProcessor>,
        status: QueueStatus,
        connectivity: ConnectivityMonitor,
        platform_retry: RetryPolicy,
    ) -> Self {
        Self {
            processor,
            status,
            connectivity,
            platform_retry,
            rescan_every: None,
        }
    }

    /// Also look at the store every `every` while online, for records written
    /// by another process that never registered a sync.
    pub fn rescan_every(mut self, every: Duration) -> Self {
        self.rescan_every = Some(every);
        self
    }

    /// Start consuming `tags`. `initial` queues are treated as already registered
    /// (records left over from a previous run).
    pub fn spawn(
        self,
        tags: mpsc::UnboundedReceiver<QueueKind>,
        initial: impl IntoIterator<Item = QueueKind>,
    ) -> BackgroundTask {
        let pending: BTreeSet<QueueKind> = initial.into_iter().collect();
        BackgroundTask::spawn(move |shutdown_rx| self.run(tags, pending, shutdown_rx))
    }

    /// Queues in the store that still hold records, minus those being drained.
    async fn scan_store(&self, pending: &mut BTreeSet<QueueKind>, in_flight: &HashSet<QueueKind>) {
        match self.status.counts().await {
            Ok(counts) => {
                let found: Vec<QueueKind> = counts
                    .non_empty()
                    .filter(|queue| !in_flight.contains(queue))
                    .collect();
                if !found.is_empty() {
                    debug!(queues = found.len(), "store scan found pending records");
                }
                pending.extend(found);
            }
            Err(err) => warn!(error = %err, "store scan failed"),
        }
    }

    async fn run(
        self,
        mut tags: mpsc::UnboundedReceiver<QueueKind>,
        mut pending: BTreeSet<QueueKind>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut online_rx = self.connectivity.subscribe();
        let mut drains: JoinSet<Step> = JoinSet::new();
        let mut timers: JoinSet<Step> = JoinSet::new();
        let mut failures: HashMap<QueueKind, u32> = HashMap::new();
        let mut in_flight: HashSet<QueueKind> = HashSet::new();
        let mut tags_open = true;
        // 起動時の leftovers は initial で受け取っている
        let mut was_online = *online_rx.borrow();
        let mut rescan = self.rescan_every.map(|every| {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        info!(pending = pending.len(), "sync worker started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let online = *online_rx.borrow_and_update();
            if online && !was_online {
                // offline 中に別プロセスが積んだ分や、retry を使い切った分を拾う
                self.scan_store(&mut pending, &in_flight).await;
            }
            was_online = online;

            if online {
                for queue in std::mem::take(&mut pending) {
                    in_flight.insert(queue);
                    let processor = Arc::clone(&self.processor);
                    drains.spawn(async move { Step::Drained(queue, processor.drain(queue).await) });
                }
            } else if !pending.is_empty() {
                debug!(pending = pending.len(), "offline, deferring sync");
            }

            let step = tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                tag = tags.recv(), if tags_open => {
                    match tag {
                        Some(queue) => {
                            debug!(%queue, "sync registered");
                            pending.insert(queue);
                        }
                        None => tags_open = false,
                    }
                    continue;
                }
                // monitor は self が持っているので送信側は閉じない
                _ = online_rx.changed() => continue,
                _ = next_tick(&mut rescan) => {
                    if online {
                        self.scan_store(&mut pending, &in_flight).await;
                    }
                    continue;
                }
                Some(joined) = drains.join_next() => joined,
                Some(joined) = timers.join_next() => joined,
            };

            let step = match step {
                Ok(step) => step,
                Err(err) => {
                    error!(error = %err, "sync task panicked");
                    continue;
                }
            };

            match step {
                Step::Drained(queue, Ok(report)) => {
                    in_flight.remove(&queue);
                    failures.remove(&queue);
                    debug!(%queue, delivered = report.delivered, retained = report.retained, "sync finished");
                }
                Step::Drained(queue, Err(err)) => {
                    in_flight.remove(&queue);
                    let attempt = failures.entry(queue).or_insert(0);
                    if *attempt >= self.platform_retry.max_retries {
                        error!(%queue, error = %err, attempts = *attempt + 1, "sync abandoned until next registration");
                        failures.remove(&queue);
                        continue;
                    }
                    let delay = self.platform_retry.delay_for(*attempt);
                    *attempt += 1;
                    warn!(%queue, error = %err, delay_ms = delay.as_millis() as u64, "sync failed, rescheduling");
                    timers.spawn(async move {
                        tokio::time::sleep(delay).await;
                        Step::RetryDue(queue)
                    });
                }
                Step::RetryDue(queue) => {
                    pending.insert(queue);
                }
            }
        }

        timers.shutdown().await;
        while let Some(joined) = drains.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "sync task panicked during shutdown");
            }
        }
        info!(deferred = pending.len(), "sync worker stopped");
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
