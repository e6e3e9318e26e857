//! Message repository: persistence and queries for conversation messages.
//!
//! Uses SqlitePoolManager and the models (MessageRecord, ConversationSummary).
//! Rows are keyed by [`crate::DurableKey`]. `local_id` is an AUTOINCREMENT integer key: stable
//! across re-keying and `VACUUM`, never reused, and the insertion order tie-breaker for rows
//! without a timestamp.
//!
//! Every write runs in an immediate transaction and is published to live observers after commit.

use crate::change_feed::{ChangeFeed, StoreChange};
use crate::error::StorageError;
use crate::models::{ConversationSummary, MessageRecord};
use crate::sqlite_pool::{SqlitePoolManager, StoreOptions};
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, instrument, warn};

const SELECT_COLUMNS: &str = r#"
    SELECT local_id, server_id, client_correlation_id, conversation_id, sender_id,
           body, image_url, audio_url, audio_duration_ms, timestamp, delivered,
           reply_message_id, reply_client_correlation_id, reply_snippet,
           reply_sender_id, reply_sender_name, reply_timestamp
    FROM messages
"#;

/// Acknowledged rows by timestamp, then unacknowledged rows in insertion order.
const ORDER_ASCENDING: &str = "ORDER BY (timestamp IS NULL) ASC, timestamp ASC, local_id ASC";
const ORDER_DESCENDING: &str = "ORDER BY (timestamp IS NULL) DESC, timestamp DESC, local_id DESC";

#[derive(Clone)]
pub struct MessageRepository {
    pool_manager: SqlitePoolManager,
    changes: ChangeFeed,
    batch_transaction_threshold: usize,
}

impl MessageRepository {
    /// Opens (creating if needed) the database at `database_url` with default policies.
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        Self::with_options(StoreOptions::new(database_url)).await
    }

    pub async fn with_options(options: StoreOptions) -> Result<Self, StorageError> {
        let pool_manager =
            SqlitePoolManager::new(&options.database_url, options.max_connections).await?;
        let repo = Self {
            pool_manager,
            changes: ChangeFeed::new(options.change_feed_capacity),
            batch_transaction_threshold: options.batch_transaction_threshold,
        };
        repo.init().await?;
        Ok(repo)
    }

    async fn init(&self) -> Result<(), StorageError> {
        info!("Creating message tables if not exist");

        let pool = self.pool_manager.pool();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                local_id INTEGER PRIMARY KEY AUTOINCREMENT,
                durable_key TEXT NOT NULL UNIQUE,
                server_id TEXT,
                client_correlation_id TEXT,
                conversation_id TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                body TEXT,
                image_url TEXT,
                audio_url TEXT,
                audio_duration_ms INTEGER,
                timestamp TEXT,
                delivered BOOLEAN NOT NULL DEFAULT 0,
                reply_message_id TEXT,
                reply_client_correlation_id TEXT,
                reply_snippet TEXT,
                reply_sender_id TEXT,
                reply_sender_name TEXT,
                reply_timestamp TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_messages_conversation_timestamp ON messages(conversation_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_messages_server_id ON messages(server_id);
            CREATE INDEX IF NOT EXISTS idx_messages_correlation_id ON messages(client_correlation_id);
            "#,
        )
        .execute(pool)
        .await?;

        info!("Message tables created successfully");
        Ok(())
    }

    /// Returns the pool manager, for components sharing this database.
    pub fn pool_manager(&self) -> &SqlitePoolManager {
        &self.pool_manager
    }

    /// Returns the underlying pool for running queries.
    pub fn pool(&self) -> &SqlitePool {
        self.pool_manager.pool()
    }

    pub fn batch_transaction_threshold(&self) -> usize {
        self.batch_transaction_threshold
    }

    /// Inserts `message` or merges it into the row it reconciles with; returns the stored row.
    #[instrument(skip(self, message), fields(conversation_id = %message.conversation_id))]
    pub async fn upsert(&self, message: &MessageRecord) -> Result<MessageRecord, StorageError> {
        let mut tx = self.pool_manager.begin_write().await?;
        let stored = upsert_in(&mut *tx, message).await?;
        tx.commit().await?;

        self.changes
            .publish(StoreChange::Conversation(stored.conversation_id.clone()));
        Ok(stored)
    }

    /// Upserts every message. Above the batch threshold the whole batch is one transaction and a
    /// failure leaves none of it visible; otherwise each message commits on its own and a failure
    /// stops the batch after the messages already written.
    #[instrument(skip(self, messages), fields(count = messages.len()))]
    pub async fn upsert_batch(
        &self,
        messages: &[MessageRecord],
    ) -> Result<Vec<MessageRecord>, StorageError> {
        if messages.len() <= self.batch_transaction_threshold {
            let mut stored = Vec::with_capacity(messages.len());
            for message in messages {
                stored.push(self.upsert(message).await?);
            }
            return Ok(stored);
        }

        let mut tx = self.pool_manager.begin_write().await?;
        let mut stored = Vec::with_capacity(messages.len());
        for message in messages {
            match upsert_in(&mut *tx, message).await {
                Ok(record) => stored.push(record),
                Err(e) => {
                    warn!(error = %e, written = stored.len(), "Batch upsert failed, rolling back");
                    return Err(e);
                }
            }
        }
        tx.commit().await?;

        let conversations: BTreeSet<&str> =
            stored.iter().map(|m| m.conversation_id.as_str()).collect();
        for conversation_id in conversations {
            self.changes
                .publish(StoreChange::Conversation(conversation_id.to_string()));
        }

        info!(count = stored.len(), "Batch upserted in one transaction");
        Ok(stored)
    }

    /// All messages of a conversation in ascending order.
    pub async fn get_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let sql = format!(
            "{} WHERE conversation_id = ? {}",
            SELECT_COLUMNS, ORDER_ASCENDING
        );
        let messages = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(conversation_id)
            .fetch_all(self.pool())
            .await?;

        debug!(
            conversation_id = %conversation_id,
            count = messages.len(),
            "Retrieved conversation messages"
        );
        Ok(messages)
    }

    /// Ascending window starting at `offset`. Offsets shift if rows are inserted before the window.
    pub async fn get_page(
        &self,
        conversation_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let sql = format!(
            "{} WHERE conversation_id = ? {} LIMIT ? OFFSET ?",
            SELECT_COLUMNS, ORDER_ASCENDING
        );
        let messages = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(conversation_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool())
            .await?;

        debug!(
            conversation_id = %conversation_id,
            limit,
            offset,
            count = messages.len(),
            "Retrieved message page"
        );
        Ok(messages)
    }

    /// The newest `limit` messages, returned oldest first.
    pub async fn get_recent(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let sql = format!(
            "{} WHERE conversation_id = ? {} LIMIT ?",
            SELECT_COLUMNS, ORDER_DESCENDING
        );
        let mut messages = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(conversation_id)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;
        messages.reverse();

        debug!(
            conversation_id = %conversation_id,
            count = messages.len(),
            "Retrieved recent messages"
        );
        Ok(messages)
    }

    /// Messages not yet acknowledged by the server, in insertion order.
    pub async fn get_pending(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let sql = format!(
            "{} WHERE conversation_id = ? AND server_id IS NULL {}",
            SELECT_COLUMNS, ORDER_ASCENDING
        );
        let messages = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(conversation_id)
            .fetch_all(self.pool())
            .await?;
        Ok(messages)
    }

    pub async fn get_by_server_id(
        &self,
        server_id: &str,
    ) -> Result<Option<MessageRecord>, StorageError> {
        let sql = format!("{} WHERE server_id = ? LIMIT 1", SELECT_COLUMNS);
        let message = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(server_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(message)
    }

    pub async fn get_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<MessageRecord>, StorageError> {
        let sql = format!("{} WHERE client_correlation_id = ? LIMIT 1", SELECT_COLUMNS);
        let message = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(correlation_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(message)
    }

    pub async fn count(&self, conversation_id: &str) -> Result<i64, StorageError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(self.pool())
            .await?;
        Ok(count.0)
    }

    #[instrument(skip(self))]
    pub async fn delete_by_conversation(&self, conversation_id: &str) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(self.pool())
            .await?;

        self.changes
            .publish(StoreChange::Conversation(conversation_id.to_string()));
        info!(
            conversation_id = %conversation_id,
            deleted = result.rows_affected(),
            "Deleted conversation messages"
        );
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM messages")
            .execute(self.pool())
            .await?;

        self.changes.publish(StoreChange::All);
        info!(deleted = result.rows_affected(), "Deleted all messages");
        Ok(result.rows_affected())
    }

    /// One summary per conversation, most recently active first.
    pub async fn conversation_summaries(&self) -> Result<Vec<ConversationSummary>, StorageError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT conversation_id, COUNT(*) AS message_count
            FROM messages
            GROUP BY conversation_id
            ORDER BY MAX(timestamp) DESC, conversation_id ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for (conversation_id, message_count) in rows {
            let last_message = self.get_recent(&conversation_id, 1).await?.pop();
            summaries.push(ConversationSummary {
                conversation_id,
                message_count,
                last_message,
            });
        }
        Ok(summaries)
    }

    /// Live view of a conversation: yields the current ordered snapshot immediately, then a fresh
    /// full snapshot after every change to that conversation. Dropping the stream unsubscribes.
    pub fn observe_conversation(
        &self,
        conversation_id: &str,
    ) -> BoxStream<'static, Result<Vec<MessageRecord>, StorageError>> {
        // Subscribe before the first read so no change between read and subscribe is lost.
        let receiver = self.changes.subscribe();
        let state = (self.clone(), receiver, conversation_id.to_string(), true);

        stream::unfold(state, |(repo, mut receiver, conversation_id, first)| async move {
            if !first {
                loop {
                    match receiver.recv().await {
                        Ok(change) if change.affects(&conversation_id) => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(
                                conversation_id = %conversation_id,
                                skipped,
                                "Observer lagged, emitting fresh snapshot"
                            );
                            break;
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
            let snapshot = repo.get_by_conversation(&conversation_id).await;
            Some((snapshot, (repo, receiver, conversation_id, false)))
        })
        .boxed()
    }
}

/// Resolves the row `message` belongs to and writes it, on an open transaction.
///
/// A message carrying both ids takes over the row holding its correlation id (re-keyed to the
/// server key), or removes that row when the server key is already stored. A message carrying
/// only a correlation id writes to whichever row already holds it. Acknowledgement fields never
/// regress.
async fn upsert_in(
    conn: &mut SqliteConnection,
    message: &MessageRecord,
) -> Result<MessageRecord, StorageError> {
    let mut key = message.durable_key().to_string();
    // Empty ids are stored as NULL so they never overwrite an assigned id.
    let server_id = message.server_id.as_deref().filter(|s| !s.is_empty());
    let correlation_id = message
        .client_correlation_id
        .as_deref()
        .filter(|s| !s.is_empty());

    if let Some(correlation_id) = correlation_id {
        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT durable_key FROM messages WHERE client_correlation_id = ? AND conversation_id = ? LIMIT 1",
        )
        .bind(correlation_id)
        .bind(&message.conversation_id)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some((existing_key,)) = existing {
            if message.is_provisional() {
                key = existing_key;
            } else if existing_key != key {
                let taken: Option<(i64,)> =
                    sqlx::query_as("SELECT 1 FROM messages WHERE durable_key = ?")
                        .bind(&key)
                        .fetch_optional(&mut *conn)
                        .await?;

                if taken.is_some() {
                    sqlx::query("DELETE FROM messages WHERE durable_key = ?")
                        .bind(&existing_key)
                        .execute(&mut *conn)
                        .await?;
                    debug!(
                        correlation_id = %correlation_id,
                        "Dropped provisional row, acknowledged copy already stored"
                    );
                } else {
                    sqlx::query("UPDATE messages SET durable_key = ? WHERE durable_key = ?")
                        .bind(&key)
                        .bind(&existing_key)
                        .execute(&mut *conn)
                        .await?;
                    debug!(
                        correlation_id = %correlation_id,
                        durable_key = %key,
                        "Reconciled provisional row"
                    );
                }
            }
        }
    }

    let reply = message.reply.clone().unwrap_or_default();

    sqlx::query(
        r#"
        INSERT INTO messages (
            durable_key, server_id, client_correlation_id, conversation_id, sender_id,
            body, image_url, audio_url, audio_duration_ms, timestamp, delivered,
            reply_message_id, reply_client_correlation_id, reply_snippet,
            reply_sender_id, reply_sender_name, reply_timestamp
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(durable_key) DO UPDATE SET
            server_id = COALESCE(excluded.server_id, messages.server_id),
            client_correlation_id = COALESCE(excluded.client_correlation_id, messages.client_correlation_id),
            conversation_id = excluded.conversation_id,
            sender_id = excluded.sender_id,
            body = excluded.body,
            image_url = excluded.image_url,
            audio_url = excluded.audio_url,
            audio_duration_ms = excluded.audio_duration_ms,
            timestamp = COALESCE(excluded.timestamp, messages.timestamp),
            delivered = MAX(excluded.delivered, messages.delivered),
            reply_message_id = excluded.reply_message_id,
            reply_client_correlation_id = excluded.reply_client_correlation_id,
            reply_snippet = excluded.reply_snippet,
            reply_sender_id = excluded.reply_sender_id,
            reply_sender_name = excluded.reply_sender_name,
            reply_timestamp = excluded.reply_timestamp
        "#,
    )
    .bind(&key)
    .bind(server_id)
    .bind(correlation_id)
    .bind(&message.conversation_id)
    .bind(&message.sender_id)
    .bind(&message.body)
    .bind(&message.image_url)
    .bind(&message.audio_url)
    .bind(message.audio_duration_ms)
    .bind(&message.timestamp)
    .bind(message.delivered)
    .bind(&reply.message_id)
    .bind(&reply.client_correlation_id)
    .bind(&reply.snippet)
    .bind(&reply.sender_id)
    .bind(&reply.sender_name)
    .bind(&reply.timestamp)
    .execute(&mut *conn)
    .await?;

    let sql = format!("{} WHERE durable_key = ?", SELECT_COLUMNS);
    let stored = sqlx::query_as::<_, MessageRecord>(&sql)
        .bind(&key)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StorageError::NotFound(key.clone()))?;

    debug!(durable_key = %key, local_id = ?stored.local_id, "Upserted message");
    Ok(stored)
}
