//! Remote chat backend abstraction.
//!
//! [`ChatApi`] is the opaque request/response boundary the sync layer forwards sends to and pulls
//! history from. The wire schema is owned by the backend; see [`crate::types`].

use crate::error::RemoteError;
use crate::types::{MessagePage, RemoteMessage, SendRequest};
use async_trait::async_trait;

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Sends one message. Resolves to the server's copy carrying a server id and timestamp, echoing
    /// the request's `client_correlation_id`.
    async fn send_message(&self, request: SendRequest) -> Result<RemoteMessage, RemoteError>;

    /// Fetches one page of a conversation's history. `cursor` is opaque; `None` means newest page.
    async fn fetch_messages(
        &self,
        conversation_id: &str,
        cursor: Option<String>,
    ) -> Result<MessagePage, RemoteError>;
}
