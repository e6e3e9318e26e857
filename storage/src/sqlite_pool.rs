//! SQLite connection pool wrapper for the storage crate.

use chat_core::ChatConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Store policies, derived from [`ChatConfig`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub database_url: String,
    pub max_connections: u32,
    /// Batches with more elements than this run in one transaction.
    pub batch_transaction_threshold: usize,
    /// Buffered change events per live observer before it is considered lagging.
    pub change_feed_capacity: usize,
}

impl StoreOptions {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self::from(&ChatConfig {
            database_url: database_url.into(),
            ..ChatConfig::default()
        })
    }

    pub fn in_memory() -> Self {
        Self::from(&ChatConfig::in_memory())
    }
}

impl From<&ChatConfig> for StoreOptions {
    fn from(config: &ChatConfig) -> Self {
        Self {
            database_url: config.database_url.clone(),
            max_connections: config.max_connections.max(1),
            batch_transaction_threshold: config.batch_transaction_threshold,
            change_feed_capacity: config.change_feed_capacity.max(1),
        }
    }
}

/// How long a writer waits for another connection's write lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Manages a single SQLite pool; creates the DB file if missing.
#[derive(Clone)]
pub struct SqlitePoolManager {
    pool: SqlitePool,
}

impl SqlitePoolManager {
    /// Creates a pool for the given database URL: a file path, a `sqlite:` URL, or
    /// `sqlite::memory:`.
    ///
    /// An in-memory database lives only as long as a connection to it, so it gets exactly one
    /// connection that never idles out.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        info!(database_url = %database_url, "Initializing SQLite pool");

        let in_memory = is_in_memory(database_url);
        let options = if database_url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(database_url)?
        } else {
            if let Some(parent) = std::path::Path::new(database_url).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            SqliteConnectOptions::new().filename(database_url)
        };
        let options = options.create_if_missing(true).busy_timeout(BUSY_TIMEOUT);

        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options.journal_mode(SqliteJournalMode::Wal))
                .await?
        };

        Ok(Self { pool })
    }

    /// Returns the underlying pool for running queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begins a transaction that takes the write lock up front (`BEGIN IMMEDIATE`).
    ///
    /// A deferred transaction that reads and then writes cannot wait for the lock: SQLite fails
    /// the upgrade with `SQLITE_BUSY` at once. Taking the lock at `BEGIN` lets concurrent writers
    /// queue on the busy timeout instead.
    pub async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin_with("BEGIN IMMEDIATE").await
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url == ":memory:"
        || database_url.starts_with("sqlite::memory:")
        || database_url.contains("mode=memory")
}
