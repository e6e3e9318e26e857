//! Chat cache configuration, loaded from environment variables (optionally via `.env`).
//!
//! Variables: `CHAT_DATABASE_URL`, `CHAT_DB_MAX_CONNECTIONS`, `CHAT_BATCH_TRANSACTION_THRESHOLD`,
//! `CHAT_CHANGE_FEED_CAPACITY`, `CHAT_NOTIFICATION_LIMIT`, `LOG_FILE`.

use crate::error::ConfigError;
use std::env;
use std::str::FromStr;

pub const DEFAULT_DATABASE_URL: &str = "./data/chat.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
/// Batches larger than this are written in a single transaction.
pub const DEFAULT_BATCH_TRANSACTION_THRESHOLD: usize = 10;
pub const DEFAULT_CHANGE_FEED_CAPACITY: usize = 64;
pub const DEFAULT_NOTIFICATION_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub batch_transaction_threshold: usize,
    pub change_feed_capacity: usize,
    pub notification_limit: usize,
    pub log_file: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            batch_transaction_threshold: DEFAULT_BATCH_TRANSACTION_THRESHOLD,
            change_feed_capacity: DEFAULT_CHANGE_FEED_CAPACITY,
            notification_limit: DEFAULT_NOTIFICATION_LIMIT,
            log_file: None,
        }
    }
}

impl ChatConfig {
    /// Loads `.env` if present, then reads the environment. Unset variables fall back to defaults;
    /// set but unparsable numbers are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Ok(Self {
            database_url: env::var("CHAT_DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: parse_var("CHAT_DB_MAX_CONNECTIONS", defaults.max_connections)?,
            batch_transaction_threshold: parse_var(
                "CHAT_BATCH_TRANSACTION_THRESHOLD",
                defaults.batch_transaction_threshold,
            )?,
            change_feed_capacity: parse_var(
                "CHAT_CHANGE_FEED_CAPACITY",
                defaults.change_feed_capacity,
            )?,
            notification_limit: parse_var("CHAT_NOTIFICATION_LIMIT", defaults.notification_limit)?,
            log_file: env::var("LOG_FILE").ok().filter(|s| !s.is_empty()),
        })
    }

    /// In-memory database with default policies; used by tests.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            ..Default::default()
        }
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}
