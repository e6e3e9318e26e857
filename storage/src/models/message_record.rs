//! Message record model for persistence.
//!
//! Maps to the `messages` table and is used by MessageRepository. A row's primary key is its
//! [`DurableKey`], derived from the record itself.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::fmt;
use uuid::Uuid;

/// Snapshot of the message a reply refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyReference {
    pub message_id: Option<String>,
    pub client_correlation_id: Option<String>,
    pub snippet: Option<String>,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Monotonic local id assigned on first insert; `None` until the record has been stored.
    pub local_id: Option<i64>,
    pub server_id: Option<String>,
    pub client_correlation_id: Option<String>,
    pub conversation_id: String,
    pub sender_id: String,
    pub body: Option<String>,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub audio_duration_ms: Option<i64>,
    /// Server-format timestamp; `None` until acknowledged.
    pub timestamp: Option<String>,
    pub delivered: bool,
    pub reply: Option<ReplyReference>,
}

/// Primary identity of a stored message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DurableKey {
    Server(String),
    Correlation(String),
    /// Hex SHA-256 over the message content; used when no id is known.
    Content(String),
}

impl fmt::Display for DurableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurableKey::Server(id) => write!(f, "srv:{}", id),
            DurableKey::Correlation(id) => write!(f, "cid:{}", id),
            DurableKey::Content(hash) => write!(f, "sha:{}", hash),
        }
    }
}

impl MessageRecord {
    /// Text message with no ids and no timestamp.
    pub fn text(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            local_id: None,
            server_id: None,
            client_correlation_id: None,
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            body: Some(body.into()),
            image_url: None,
            audio_url: None,
            audio_duration_ms: None,
            timestamp: None,
            delivered: false,
            reply: None,
        }
    }

    /// Generates a fresh client correlation id (UUID v4).
    pub fn new_correlation_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.client_correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_delivered(mut self, delivered: bool) -> Self {
        self.delivered = delivered;
        self
    }

    /// A provisional message has been stored locally but not acknowledged by the server.
    /// An empty server id counts as none.
    pub fn is_provisional(&self) -> bool {
        non_empty(&self.server_id).is_none()
    }

    /// Server id, else client correlation id, else content hash.
    pub fn durable_key(&self) -> DurableKey {
        if let Some(id) = non_empty(&self.server_id) {
            return DurableKey::Server(id.to_string());
        }
        if let Some(id) = non_empty(&self.client_correlation_id) {
            return DurableKey::Correlation(id.to_string());
        }
        DurableKey::Content(self.content_hash())
    }

    fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            Some(self.sender_id.as_str()),
            self.body.as_deref(),
            Some(self.conversation_id.as_str()),
            self.image_url.as_deref(),
            self.audio_url.as_deref(),
            self.timestamp.as_deref(),
        ] {
            match field {
                Some(value) => {
                    hasher.update([1u8]);
                    hasher.update((value.len() as u64).to_le_bytes());
                    hasher.update(value.as_bytes());
                }
                None => hasher.update([0u8]),
            }
        }
        hex::encode(hasher.finalize())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl<'r> FromRow<'r, SqliteRow> for MessageRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let reply = ReplyReference {
            message_id: row.try_get("reply_message_id")?,
            client_correlation_id: row.try_get("reply_client_correlation_id")?,
            snippet: row.try_get("reply_snippet")?,
            sender_id: row.try_get("reply_sender_id")?,
            sender_name: row.try_get("reply_sender_name")?,
            timestamp: row.try_get("reply_timestamp")?,
        };

        Ok(Self {
            local_id: Some(row.try_get("local_id")?),
            server_id: row.try_get("server_id")?,
            client_correlation_id: row.try_get("client_correlation_id")?,
            conversation_id: row.try_get("conversation_id")?,
            sender_id: row.try_get("sender_id")?,
            body: row.try_get("body")?,
            image_url: row.try_get("image_url")?,
            audio_url: row.try_get("audio_url")?,
            audio_duration_ms: row.try_get("audio_duration_ms")?,
            timestamp: row.try_get("timestamp")?,
            delivered: row.try_get("delivered")?,
            reply: (reply != ReplyReference::default()).then_some(reply),
        })
    }
}
