use thiserror::Error;

use crate::domain::QueueKind;

/// Durable store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("payload encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Network replay failures. All of them are treated as transient.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{method} {path} returned HTTP {status}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Deferred sync registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The host has no background worker or deferred sync facility.
    #[error("background sync is not supported")]
    Unsupported,

    #[error("sync worker is gone")]
    Closed,
}

/// Errors surfaced by the sync processor to its caller (the worker or a manual sync).
///
/// Record-level failures never show up here; those records stay queued.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("drain of {queue} failed: {source}")]
    Drain {
        queue: QueueKind,
        #[source]
        source: StoreError,
    },
}
