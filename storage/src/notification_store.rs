//! Notification store: in-app notifications kept as one JSON array in the `preferences` table.
//!
//! Newest first, capped at a fixed number of entries.

use crate::error::StorageError;
use crate::models::Notification;
use crate::sqlite_pool::SqlitePoolManager;
use chat_core::ChatConfig;
use sqlx::SqliteExecutor;
use tracing::{debug, info};

const NOTIFICATIONS_KEY: &str = "notifications";

#[derive(Clone)]
pub struct NotificationStore {
    pool_manager: SqlitePoolManager,
    limit: usize,
}

impl NotificationStore {
    /// Creates the store on an existing pool (usually shared with the message repository).
    pub async fn new(pool_manager: SqlitePoolManager, limit: usize) -> Result<Self, StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(pool_manager.pool())
        .await?;

        Ok(Self {
            pool_manager,
            limit: limit.max(1),
        })
    }

    /// Creates the store with the limit from `CHAT_NOTIFICATION_LIMIT`.
    pub async fn from_config(
        pool_manager: SqlitePoolManager,
        config: &ChatConfig,
    ) -> Result<Self, StorageError> {
        Self::new(pool_manager, config.notification_limit).await
    }

    /// All notifications, newest first. Missing document reads as empty.
    pub async fn load(&self) -> Result<Vec<Notification>, StorageError> {
        read_all(self.pool_manager.pool()).await
    }

    /// Prepends `notification`, dropping the oldest entries beyond the limit.
    pub async fn push(&self, notification: Notification) -> Result<(), StorageError> {
        let mut tx = self.pool_manager.begin_write().await?;
        let mut notifications = read_all(&mut *tx).await?;
        notifications.retain(|n| n.id != notification.id);
        notifications.insert(0, notification);
        notifications.truncate(self.limit);
        write_all(&mut *tx, &notifications).await?;
        tx.commit().await?;

        debug!(count = notifications.len(), "Stored notification");
        Ok(())
    }

    /// Marks one notification read; returns false if no notification has that id.
    pub async fn mark_read(&self, id: &str) -> Result<bool, StorageError> {
        let mut tx = self.pool_manager.begin_write().await?;
        let mut notifications = read_all(&mut *tx).await?;
        let Some(target) = notifications.iter_mut().find(|n| n.id == id) else {
            return Ok(false);
        };
        target.read = true;
        write_all(&mut *tx, &notifications).await?;
        tx.commit().await?;
        Ok(true)
    }

    pub async fn unread_count(&self) -> Result<usize, StorageError> {
        Ok(self.load().await?.iter().filter(|n| !n.read).count())
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM preferences WHERE key = ?")
            .bind(NOTIFICATIONS_KEY)
            .execute(self.pool_manager.pool())
            .await?;
        info!("Cleared notifications");
        Ok(())
    }
}

async fn read_all<'e, E: SqliteExecutor<'e>>(executor: E) -> Result<Vec<Notification>, StorageError> {
    let value: Option<(String,)> = sqlx::query_as("SELECT value FROM preferences WHERE key = ?")
        .bind(NOTIFICATIONS_KEY)
        .fetch_optional(executor)
        .await?;

    match value {
        Some((json,)) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

async fn write_all<'e, E: SqliteExecutor<'e>>(
    executor: E,
    notifications: &[Notification],
) -> Result<(), StorageError> {
    let json = serde_json::to_string(notifications)?;
    sqlx::query(
        r#"
        INSERT INTO preferences (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(NOTIFICATIONS_KEY)
    .bind(json)
    .execute(executor)
    .await?;
    Ok(())
}
