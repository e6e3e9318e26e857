//! Storage crate: on-device chat message cache.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`models`] – MessageRecord, DurableKey, ConversationSummary, Notification
//! - [`message_repo`] – MessageRepository (SQLite), including live conversation snapshots
//! - [`change_feed`] – StoreChange events published after each commit
//! - [`notification_store`] – NotificationStore (JSON document in the preferences table)
//! - [`sqlite_pool`] – SqlitePoolManager, StoreOptions

mod change_feed;
mod error;
mod message_repo;
mod models;
mod notification_store;
mod sqlite_pool;


pub use change_feed::StoreChange;
pub use error::StorageError;
pub use message_repo::MessageRepository;
pub use models::{
    ConversationSummary, DurableKey, MessageRecord, Notification, NotificationKind, ReplyReference,
};
pub use notification_store::NotificationStore;
pub use sqlite_pool::{SqlitePoolManager, StoreOptions};
