use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use feedsync_core::app::{AppBuilder, ConnectivityMonitor, EnqueueOutcome, OfflineSync};
use feedsync_core::config::SyncConfig;
use feedsync_core::domain::{Delivery, QueueKind, RecordId};
use feedsync_core::impls::{BroadcastEventSink, HttpTransport, TeeEventSink, TracingEventSink};
use feedsync_core::observability::init_logging;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "feedsync")]
#[command(about = "Offline action queue for the feedback app", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file
    #[arg(short, long, env = "FEEDSYNC_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue an action (JSON payload) for later delivery
    Enqueue {
        /// Queue name, e.g. comment-create-queue
        queue: QueueKind,
        /// JSON payload
        payload: String,
    },
    /// Show pending records per queue
    Status,
    /// Drain one queue (or all of them) right now
    Sync { queue: Option<QueueKind> },
    /// Drop every pending record of a queue
    Clear { queue: QueueKind },
    /// Run the background sync worker until Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = SyncConfig::load(cli.config.as_deref()).context("loading config")?;

    match cli.command {
        Commands::Enqueue { queue, payload } => enqueue(&config, queue, &payload).await,
        Commands::Status => status(&config).await,
        Commands::Sync { queue } => sync(&config, queue).await,
        Commands::Clear { queue } => clear(&config, queue).await,
        Commands::Run => run(&config).await,
    }
}

async fn open(config: &SyncConfig, builder: impl FnOnce(AppBuilder) -> AppBuilder) -> Result<OfflineSync> {
    let base = AppBuilder::from_config(config)
        .await
        .context("opening offline queue")?;
    builder(base).build().context("wiring offline queue")
}

async fn enqueue(config: &SyncConfig, queue: QueueKind, payload: &str) -> Result<()> {
    let data: serde_json::Value = serde_json::from_str(payload).context("payload is not valid JSON")?;
    // 単発コマンドなので worker はいない。background sync は `run` に任せる
    let sync = open(config, |b| b.background_sync(false)).await?;

    match sync.enqueue(queue, &data).await {
        EnqueueOutcome::Queued { id, delivery } => {
            println!("{}", queued_message(queue, id, delivery));
            Ok(())
        }
        EnqueueOutcome::Failed => bail!("failed to queue action for {queue}"),
    }
}

fn queued_message(queue: QueueKind, id: RecordId, delivery: Delivery) -> String {
    match delivery {
        Delivery::Background => format!("queued {queue} #{id}; it will be sent when you're back online"),
        Delivery::Manual => format!(
            "queued {queue} #{id}; no background sync here, run `feedsync sync` once you're back online \
             (or keep `feedsync run` going)"
        ),
    }
}

async fn status(config: &SyncConfig) -> Result<()> {
    let sync = open(config, |b| b).await?;
    let counts = sync.counts().await.context("reading queue counts")?;
    for (queue, pending) in &counts.pending {
        println!("{:<24} {pending}", queue.to_string());
    }
    println!("{:<24} {}", "total", counts.total());
    Ok(())
}

async fn sync(config: &SyncConfig, queue: Option<QueueKind>) -> Result<()> {
    let sync = open(config, |b| b.background_sync(false)).await?;
    let results = match queue {
        Some(queue) => vec![(queue, sync.sync(queue).await)],
        None => sync.sync_all().await,
    };

    let mut failed = 0;
    for (queue, result) in results {
        match result {
            Ok(report) if report.is_empty() => {}
            Ok(report) => println!(
                "{queue}: delivered {} / {}, kept {}",
                report.delivered, report.attempted, report.retained
            ),
            Err(err) => {
                failed += 1;
                eprintln!("{queue}: {err}");
            }
        }
    }
    if failed > 0 {
        bail!("{failed} queue(s) could not be read");
    }
    Ok(())
}

async fn clear(config: &SyncConfig, queue: QueueKind) -> Result<()> {
    let sync = open(config, |b| b).await?;
    let removed = sync.clear(queue).await.context("clearing queue")?;
    println!("removed {removed} record(s) from {queue}");
    Ok(())
}

async fn run(config: &SyncConfig) -> Result<()> {
    let probe_transport = HttpTransport::new(&config.api_base_url, config.request_timeout())
        .context("building connectivity probe")?;
    let connectivity = ConnectivityMonitor::new(probe_transport.probe().await);

    // ログに残しつつ、同じイベントを画面にも流す
    let toasts = BroadcastEventSink::new(64);
    let mut events = toasts.subscribe();
    let sink = Arc::new(TeeEventSink::new(TracingEventSink, toasts));

    let mut sync = open(config, |b| b.connectivity(connectivity.clone()).events(sink)).await?;
    let mut window = sync.connect_client().await;
    let worker = sync.start_worker().await.context("starting sync worker")?;
    let probe = connectivity.spawn_probe(config.worker.probe_interval(), move || {
        let transport = probe_transport.clone();
        async move { transport.probe().await }
    });

    info!(online = connectivity.is_online(), "sync worker running, Ctrl-C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    error!(error = %err, "failed to listen for Ctrl-C");
                }
                break;
            }
            message = window.recv() => match message {
                Some(message) => println!("{}", serde_json::to_string(&message)?),
                None => break,
            },
            event = events.recv() => match event {
                Ok(event) => eprintln!("{}", event.message()),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "dropped queue events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("shutting down");
    probe.shutdown_and_join().await;
    worker.shutdown_and_join().await;
    Ok(())
}
