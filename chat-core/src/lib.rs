//! # chat-core
//!
//! Shared pieces of the chat cache: wire types exchanged with the chat backend, the [`ChatApi`]
//! trait the sync layer forwards to, error types, [`ChatConfig`] and tracing initialization.
//! Storage-agnostic; used by `storage` and `chat-sync`.

pub mod api;
pub mod config;
pub mod error;
pub mod logger;
pub mod types;

pub use api::ChatApi;
pub use config::ChatConfig;
pub use error::{ConfigError, RemoteError};
pub use logger::{init_tracing, init_tracing_from_config};
pub use types::{MessagePage, OutgoingMessage, RemoteMessage, ReplyPreview, SendRequest};
