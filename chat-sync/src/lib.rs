//! # chat-sync
//!
//! [`ChatRepository`] is the read/write API chat screens use: it stores sends optimistically,
//! forwards them through a [`chat_core::ChatApi`], and merges acknowledgements and remote
//! messages into the local store so each logical message is one row.
//!
//! [`PrewarmCache`] holds data loaded ahead of a screen; it is created and owned by the caller.

pub mod chat_repository;
pub mod error;
pub mod mapping;
pub mod prewarm;

pub use chat_repository::{ChatRepository, SyncedPage};
pub use error::SyncError;
pub use prewarm::PrewarmCache;
