//! Wire types: what the chat backend sends and receives. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// Preview of the message being replied to, as carried on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplyPreview {
    pub message_id: Option<String>,
    pub client_correlation_id: Option<String>,
    pub snippet: Option<String>,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub timestamp: Option<String>,
}

/// A message as the backend reports it: either the ack of our own send or a message pushed/fetched
/// from the other participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    /// Server-assigned id.
    pub id: String,
    /// Echo of the sender's correlation id; absent for messages composed elsewhere.
    #[serde(default)]
    pub client_correlation_id: Option<String>,
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub audio_duration_ms: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub delivered: bool,
    #[serde(default)]
    pub reply: Option<ReplyPreview>,
}

/// A message composed by the local user, before any id is assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub body: Option<String>,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub audio_duration_ms: Option<i64>,
    pub reply: Option<ReplyPreview>,
}

impl OutgoingMessage {
    /// Plain text message.
    pub fn text(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            body: Some(body.into()),
            ..Default::default()
        }
    }

    /// Image message; the image is already uploaded and referenced by URL.
    pub fn image(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            image_url: Some(image_url.into()),
            ..Default::default()
        }
    }

    /// Voice note with its duration in milliseconds.
    pub fn audio(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        audio_url: impl Into<String>,
        duration_ms: i64,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            audio_url: Some(audio_url.into()),
            audio_duration_ms: Some(duration_ms),
            ..Default::default()
        }
    }

    pub fn with_reply(mut self, reply: ReplyPreview) -> Self {
        self.reply = Some(reply);
        self
    }
}

/// Request body for [`crate::ChatApi::send_message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub conversation_id: String,
    pub client_correlation_id: String,
    pub sender_id: String,
    pub body: Option<String>,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub audio_duration_ms: Option<i64>,
    pub reply: Option<ReplyPreview>,
}

/// One page of history returned by [`crate::ChatApi::fetch_messages`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<RemoteMessage>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}
