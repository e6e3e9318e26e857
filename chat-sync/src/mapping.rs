//! Conversions between wire types ([`chat_core::types`]) and stored [`MessageRecord`]s.

use chat_core::{OutgoingMessage, RemoteMessage, ReplyPreview, SendRequest};
use storage::{MessageRecord, ReplyReference};

/// Stored form of a message reported by the server. An empty id is treated as missing.
pub fn from_remote(message: RemoteMessage) -> MessageRecord {
    MessageRecord {
        local_id: None,
        server_id: Some(message.id).filter(|id| !id.is_empty()),
        client_correlation_id: message.client_correlation_id,
        conversation_id: message.conversation_id,
        sender_id: message.sender_id,
        body: message.body,
        image_url: message.image_url,
        audio_url: message.audio_url,
        audio_duration_ms: message.audio_duration_ms,
        timestamp: message.timestamp,
        delivered: message.delivered,
        reply: message.reply.map(reply_from_wire),
    }
}

/// Unacknowledged local copy of a message being sent.
pub fn provisional(draft: &OutgoingMessage, correlation_id: &str) -> MessageRecord {
    MessageRecord {
        local_id: None,
        server_id: None,
        client_correlation_id: Some(correlation_id.to_string()),
        conversation_id: draft.conversation_id.clone(),
        sender_id: draft.sender_id.clone(),
        body: draft.body.clone(),
        image_url: draft.image_url.clone(),
        audio_url: draft.audio_url.clone(),
        audio_duration_ms: draft.audio_duration_ms,
        timestamp: None,
        delivered: false,
        reply: draft.reply.clone().map(reply_from_wire),
    }
}

/// Send request for a stored message, carrying `correlation_id` so the ack can be matched.
pub fn send_request(record: &MessageRecord, correlation_id: &str) -> SendRequest {
    SendRequest {
        conversation_id: record.conversation_id.clone(),
        client_correlation_id: correlation_id.to_string(),
        sender_id: record.sender_id.clone(),
        body: record.body.clone(),
        image_url: record.image_url.clone(),
        audio_url: record.audio_url.clone(),
        audio_duration_ms: record.audio_duration_ms,
        reply: record.reply.clone().map(reply_to_wire),
    }
}

fn reply_from_wire(reply: ReplyPreview) -> ReplyReference {
    ReplyReference {
        message_id: reply.message_id,
        client_correlation_id: reply.client_correlation_id,
        snippet: reply.snippet,
        sender_id: reply.sender_id,
        sender_name: reply.sender_name,
        timestamp: reply.timestamp,
    }
}

fn reply_to_wire(reply: ReplyReference) -> ReplyPreview {
    ReplyPreview {
        message_id: reply.message_id,
        client_correlation_id: reply.client_correlation_id,
        snippet: reply.snippet,
        sender_id: reply.sender_id,
        sender_name: reply.sender_name,
        timestamp: reply.timestamp,
    }
}
