//! Storage models: MessageRecord (and its durable key), ConversationSummary, Notification.

mod conversation_summary;
mod message_record;
mod notification;

pub use conversation_summary::ConversationSummary;
pub use message_record::{DurableKey, MessageRecord, ReplyReference};
pub use notification::{Notification, NotificationKind};
