//! Pre-warm cache: data loaded ahead of a screen and handed over once.
//!
//! The owner creates one cache and passes it (usually as `Arc<PrewarmCache>`) to the screens that
//! read it. Every slot is take-once.

use storage::{ConversationSummary, MessageRecord, MessageRepository, StorageError};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct PrewarmCache {
    summaries: Mutex<Option<Vec<ConversationSummary>>>,
    messages: Mutex<Option<(String, Vec<MessageRecord>)>>,
}

impl PrewarmCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads conversation summaries and, if given, the newest `limit` messages of one conversation.
    pub async fn warm(
        &self,
        store: &MessageRepository,
        conversation_id: Option<&str>,
        limit: i64,
    ) -> Result<(), StorageError> {
        let summaries = store.conversation_summaries().await?;
        debug!(conversations = summaries.len(), "Pre-warmed conversation summaries");
        self.put_summaries(summaries).await;

        if let Some(conversation_id) = conversation_id {
            let messages = store.get_recent(conversation_id, limit).await?;
            debug!(
                conversation_id = %conversation_id,
                count = messages.len(),
                "Pre-warmed messages"
            );
            self.put_messages(conversation_id, messages).await;
        }
        Ok(())
    }

    pub async fn put_summaries(&self, summaries: Vec<ConversationSummary>) {
        *self.summaries.lock().await = Some(summaries);
    }

    pub async fn put_messages(&self, conversation_id: &str, messages: Vec<MessageRecord>) {
        *self.messages.lock().await = Some((conversation_id.to_string(), messages));
    }

    pub async fn take_summaries(&self) -> Option<Vec<ConversationSummary>> {
        self.summaries.lock().await.take()
    }

    /// Takes the cached messages if they belong to `conversation_id`; otherwise leaves them.
    pub async fn take_messages(&self, conversation_id: &str) -> Option<Vec<MessageRecord>> {
        let mut slot = self.messages.lock().await;
        match slot.as_ref() {
            Some((cached, _)) if cached == conversation_id => slot.take().map(|(_, m)| m),
            _ => None,
        }
    }

    pub async fn clear(&self) {
        self.summaries.lock().await.take();
        self.messages.lock().await.take();
    }
}
