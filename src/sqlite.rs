//! SQLite byte store implementation.
//!
//! Features:
//! - WAL mode for concurrent readers
//! - Single-file durable settings
//! - Change signal via in-memory channels (per-process)

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::signal::{ChangeNotifier, ChangeSignal};
use crate::store::{validate_key, ByteStore};

/// SQLite implementation of [`ByteStore`].
///
/// Change signals are in-process only; another process writing the same
/// file will not wake this process's subscribers.
pub struct SqliteByteStore {
    pool: SqlitePool,
    notifier: ChangeNotifier,
}

impl SqliteByteStore {
    /// Open or create a SQLite store at the given path with default settings.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, &StoreConfig::default()).await
    }

    /// Open or create a SQLite store at the given path.
    pub async fn open_with_config(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening SQLite settings store");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let journal_mode = if config.sqlite.wal {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        };

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(journal_mode)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.sqlite.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.sqlite.max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self {
            pool,
            notifier: ChangeNotifier::new(config.signal_capacity),
        };

        store.init_schema().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub async fn in_memory() -> Result<Self> {
        Self::in_memory_with_config(&StoreConfig::default()).await
    }

    /// Create an in-memory SQLite store using the signal capacity and busy
    /// timeout from `config`. The pool is always a single connection.
    pub async fn in_memory_with_config(config: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .busy_timeout(config.sqlite.busy_timeout());

        // Each connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self {
            pool,
            notifier: ChangeNotifier::new(config.signal_capacity),
        };

        store.init_schema().await?;
        Ok(store)
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("SQLite settings schema initialized");
        Ok(())
    }

    /// Fire the change signal without touching any data.
    pub fn notify_external_change(&self) {
        self.notifier.notify();
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get current Unix timestamp.
    fn now_unix() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}

#[async_trait]
impl ByteStore for SqliteByteStore {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;

        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<()> {
        validate_key(key)?;

        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(&value)
        .bind(Self::now_unix())
        .execute(&self.pool)
        .await?;

        self.notifier.notify();
        Ok(())
    }

    fn subscribe(&self) -> ChangeSignal {
        self.notifier.subscribe()
    }
}
