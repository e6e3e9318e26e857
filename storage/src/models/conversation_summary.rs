//! Per-conversation projection for chat-list screens.
//!
//! Returned by MessageRepository::conversation_summaries.

use crate::models::MessageRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub message_count: i64,
    /// Newest message in ascending conversation order.
    pub last_message: Option<MessageRecord>,
}
