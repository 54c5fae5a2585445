//! SqliteQueueStore - SQLite による永続キュー
//!
//! # レイアウト
//! - DB ファイル 1 つ（`offline-actions-db`、schema version 1）
//! - queue ごとに 1 テーブル（`offline-<queueName>`）
//! - `id INTEGER PRIMARY KEY AUTOINCREMENT` で key は再利用されない
//!
//! テーブルは初回 add 時に作成します。未作成の store の読み出しは空扱いです。

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::domain::{QueueKind, QueueRecord, RecordId};
use crate::error::StoreError;
use crate::ports::QueueStore;

/// Logical database name.
pub const DATABASE_NAME: &str = "offline-actions-db";

/// Current schema version (`PRAGMA user_version`).
pub const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone)]
pub struct SqliteQueueStore {
    pool: SqlitePool,
}

impl SqliteQueueStore {
    /// Open (or create) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(path = %path.display(), db = DATABASE_NAME, "queue store opened");
        Ok(store)
    }

    /// Private in-memory database. A single connection keeps every query on
    /// the same memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Bring `user_version` up to `SCHEMA_VERSION`.
    ///
    /// Version 1 has no shared tables: per-queue tables are created on first write.
    async fn migrate(&self) -> Result<(), StoreError> {
        let current: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;

        if current > SCHEMA_VERSION {
            return Err(StoreError::Unavailable(format!(
                "{DATABASE_NAME} has schema version {current}, newer than supported {SCHEMA_VERSION}"
            )));
        }
        if current < SCHEMA_VERSION {
            // PRAGMA はバインド変数を受け付けない
            sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
                .execute(&self.pool)
                .await?;
            debug!(from = current, to = SCHEMA_VERSION, "queue store migrated");
        }
        Ok(())
    }

    fn table(queue: QueueKind) -> String {
        // store 名は QueueKind 由来なので quote だけで十分
        format!("\"{}\"", queue.store_name())
    }

    async fn ensure_store(&self, queue: QueueKind) -> Result<(), StoreError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                data TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )",
            Self::table(queue)
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn store_exists(&self, queue: QueueKind) -> Result<bool, StoreError> {
        let found: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        )
        .bind(queue.store_name())
        .fetch_one(&self.pool)
        .await?;
        Ok(found > 0)
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn add(
        &self,
        queue: QueueKind,
        data: serde_json::Value,
        timestamp: i64,
    ) -> Result<RecordId, StoreError> {
        self.ensure_store(queue).await?;
        let encoded = serde_json::to_string(&data)?;

        let sql = format!(
            "INSERT INTO {} (data, timestamp) VALUES (?1, ?2)",
            Self::table(queue)
        );
        let result = sqlx::query(&sql)
            .bind(encoded)
            .bind(timestamp)
            .execute(&self.pool)
            .await?;

        Ok(RecordId::new(result.last_insert_rowid()))
    }

    async fn get_all(&self, queue: QueueKind) -> Result<Vec<QueueRecord>, StoreError> {
        if !self.store_exists(queue).await? {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, data, timestamp FROM {} ORDER BY id ASC",
            Self::table(queue)
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let data: String = row.try_get("data")?;
            let timestamp: i64 = row.try_get("timestamp")?;
            records.push(QueueRecord::new(
                RecordId::new(id),
                serde_json::from_str(&data)?,
                timestamp,
            ));
        }
        Ok(records)
    }

    async fn delete(&self, queue: QueueKind, id: RecordId) -> Result<(), StoreError> {
        if !self.store_exists(queue).await? {
            return Ok(());
        }
        let sql = format!("DELETE FROM {} WHERE id = ?1", Self::table(queue));
        sqlx::query(&sql).bind(id.get()).execute(&self.pool).await?;
        Ok(())
    }

    async fn count(&self, queue: QueueKind) -> Result<u64, StoreError> {
        if !self.store_exists(queue).await? {
            return Ok(0);
        }
        let sql = format!("SELECT COUNT(*) FROM {}", Self::table(queue));
        let n: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(n as u64)
    }

    async fn clear(&self, queue: QueueKind) -> Result<u64, StoreError> {
        if !self.store_exists(queue).await? {
            return Ok(0);
        }
        let sql = format!("DELETE FROM {}", Self::table(queue));
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
