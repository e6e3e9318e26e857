//! Chat repository: optimistic send plus server reconciliation over [`MessageRepository`].
//!
//! Sends are stored before the network call; acknowledgements and remote messages are merged
//! through the store's upsert, which collapses a provisional row and its ack into one row.
//! Nothing here retries on its own; [`ChatRepository::resend_pending`] is caller-driven.

use crate::error::SyncError;
use crate::mapping;
use chat_core::{ChatApi, OutgoingMessage, RemoteMessage};
use futures::stream::BoxStream;
use std::sync::Arc;
use storage::{MessageRecord, MessageRepository, StorageError};
use tracing::{debug, info, instrument, warn};

/// Messages merged from one remote history page, in ascending local order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedPage {
    pub messages: Vec<MessageRecord>,
    pub next_cursor: Option<String>,
}

pub struct ChatRepository<A> {
    store: MessageRepository,
    api: Arc<A>,
}

impl<A> Clone for ChatRepository<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            api: Arc::clone(&self.api),
        }
    }
}

impl<A: ChatApi> ChatRepository<A> {
    pub fn new(store: MessageRepository, api: Arc<A>) -> Self {
        Self { store, api }
    }

    pub fn store(&self) -> &MessageRepository {
        &self.store
    }

    /// Stores `draft` as a provisional row, forwards it, and reconciles the ack.
    ///
    /// On a remote failure the provisional row stays visible and the error is returned; the
    /// caller may later call [`Self::resend_pending`].
    #[instrument(skip(self, draft), fields(conversation_id = %draft.conversation_id))]
    pub async fn send(&self, draft: OutgoingMessage) -> Result<MessageRecord, SyncError> {
        let correlation_id = MessageRecord::new_correlation_id();
        let stored = self
            .store
            .upsert(&mapping::provisional(&draft, &correlation_id))
            .await?;
        debug!(
            correlation_id = %correlation_id,
            local_id = ?stored.local_id,
            "Stored provisional message"
        );

        self.forward(&stored, &correlation_id).await
    }

    async fn forward(
        &self,
        record: &MessageRecord,
        correlation_id: &str,
    ) -> Result<MessageRecord, SyncError> {
        let request = mapping::send_request(record, correlation_id);
        match self.api.send_message(request).await {
            Ok(mut ack) => {
                // The ack answers our request, so it belongs to our correlation id even if the
                // server did not echo it.
                if ack.client_correlation_id.is_none() {
                    ack.client_correlation_id = Some(correlation_id.to_string());
                }
                let reconciled = self.apply_remote(ack).await?;
                info!(
                    correlation_id = %correlation_id,
                    server_id = ?reconciled.server_id,
                    "Message acknowledged"
                );
                Ok(reconciled)
            }
            Err(e) => {
                warn!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "Send failed, message left pending"
                );
                Err(SyncError::Remote(e))
            }
        }
    }

    /// Merges one message reported by the server (ack or delivery from the other participant).
    pub async fn apply_remote(&self, message: RemoteMessage) -> Result<MessageRecord, SyncError> {
        Ok(self.store.upsert(&mapping::from_remote(message)).await?)
    }

    /// Merges several server messages; large batches are applied atomically by the store.
    pub async fn apply_remote_batch(
        &self,
        messages: Vec<RemoteMessage>,
    ) -> Result<Vec<MessageRecord>, SyncError> {
        let records: Vec<MessageRecord> = messages.into_iter().map(mapping::from_remote).collect();
        Ok(self.store.upsert_batch(&records).await?)
    }

    /// Pulls one history page from the server and merges it.
    #[instrument(skip(self))]
    pub async fn fetch(
        &self,
        conversation_id: &str,
        cursor: Option<String>,
    ) -> Result<SyncedPage, SyncError> {
        let page = self.api.fetch_messages(conversation_id, cursor).await?;
        let received = page.messages.len();
        let mut messages = self.apply_remote_batch(page.messages).await?;
        messages.sort_by(|a, b| {
            (a.timestamp.is_none(), &a.timestamp, a.local_id)
                .cmp(&(b.timestamp.is_none(), &b.timestamp, b.local_id))
        });

        info!(
            conversation_id = %conversation_id,
            received,
            has_more = page.next_cursor.is_some(),
            "Merged remote history page"
        );
        Ok(SyncedPage {
            messages,
            next_cursor: page.next_cursor,
        })
    }

    /// Re-forwards every unacknowledged message of the conversation, oldest first, and returns how
    /// many were acknowledged. Stops at the first remote failure.
    #[instrument(skip(self))]
    pub async fn resend_pending(&self, conversation_id: &str) -> Result<usize, SyncError> {
        let pending = self.store.get_pending(conversation_id).await?;
        let mut acknowledged = 0;

        for record in pending {
            let Some(correlation_id) = record.client_correlation_id.clone() else {
                warn!(local_id = ?record.local_id, "Pending message has no correlation id, skipping");
                continue;
            };
            self.forward(&record, &correlation_id).await?;
            acknowledged += 1;
        }

        Ok(acknowledged)
    }

    pub fn observe(
        &self,
        conversation_id: &str,
    ) -> BoxStream<'static, Result<Vec<MessageRecord>, StorageError>> {
        self.store.observe_conversation(conversation_id)
    }

    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, SyncError> {
        Ok(self.store.get_by_conversation(conversation_id).await?)
    }

    pub async fn page(
        &self,
        conversation_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageRecord>, SyncError> {
        Ok(self.store.get_page(conversation_id, limit, offset).await?)
    }

    pub async fn recent(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, SyncError> {
        Ok(self.store.get_recent(conversation_id, limit).await?)
    }

    pub async fn count(&self, conversation_id: &str) -> Result<i64, SyncError> {
        Ok(self.store.count(conversation_id).await?)
    }

    pub async fn clear_conversation(&self, conversation_id: &str) -> Result<u64, SyncError> {
        Ok(self.store.delete_by_conversation(conversation_id).await?)
    }

    pub async fn purge(&self) -> Result<u64, SyncError> {
        Ok(self.store.delete_all().await?)
    }
}
