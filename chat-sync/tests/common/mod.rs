//! Mock implementation of [`chat_core::ChatApi`] for integration tests.
//!
//! Records every send request, acknowledges with sequential server ids (`S1`, `S2`, ...) and
//! serves history pages set up by the test. Can be switched to fail sends.

#![allow(dead_code)]

use async_trait::async_trait;
use chat_core::{ChatApi, MessagePage, RemoteError, RemoteMessage, SendRequest};
use std::collections::HashMap;
use std::sync::Arc;
use storage::MessageRepository;
use tokio::sync::Mutex;

#[derive(Default)]
struct MockState {
    sent: Vec<SendRequest>,
    next_server_id: usize,
    fail_sends: bool,
    echo_correlation_id: bool,
    pages: HashMap<(String, Option<String>), MessagePage>,
}

pub struct MockChatApi {
    state: Mutex<MockState>,
}

impl MockChatApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                echo_correlation_id: true,
                ..Default::default()
            }),
        })
    }

    pub async fn set_failing(&self, fail: bool) {
        self.state.lock().await.fail_sends = fail;
    }

    pub async fn set_echo_correlation_id(&self, echo: bool) {
        self.state.lock().await.echo_correlation_id = echo;
    }

    pub async fn set_page(&self, conversation_id: &str, cursor: Option<&str>, page: MessagePage) {
        self.state.lock().await.pages.insert(
            (conversation_id.to_string(), cursor.map(str::to_string)),
            page,
        );
    }

    pub async fn sent(&self) -> Vec<SendRequest> {
        self.state.lock().await.sent.clone()
    }
}

/// Server timestamp for the `i`-th second after 2024-01-01 10:00:00.
pub fn ts(i: usize) -> String {
    format!("2024-01-01 10:{:02}:{:02}", (i / 60) % 60, i % 60)
}

/// Message from the other participant, as the server reports it.
pub fn remote(conversation_id: &str, server_id: &str, i: usize) -> RemoteMessage {
    RemoteMessage {
        id: server_id.to_string(),
        client_correlation_id: None,
        conversation_id: conversation_id.to_string(),
        sender_id: "them".to_string(),
        body: Some(format!("remote {}", i)),
        image_url: None,
        audio_url: None,
        audio_duration_ms: None,
        timestamp: Some(ts(i)),
        delivered: true,
        reply: None,
    }
}

pub async fn memory_store() -> MessageRepository {
    MessageRepository::new("sqlite::memory:")
        .await
        .expect("Failed to create repository")
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn send_message(&self, request: SendRequest) -> Result<RemoteMessage, RemoteError> {
        let mut state = self.state.lock().await;
        state.sent.push(request.clone());
        if state.fail_sends {
            return Err(RemoteError::Transport("connection reset".to_string()));
        }

        state.next_server_id += 1;
        let n = state.next_server_id;
        Ok(RemoteMessage {
            id: format!("S{}", n),
            client_correlation_id: state
                .echo_correlation_id
                .then(|| request.client_correlation_id.clone()),
            conversation_id: request.conversation_id,
            sender_id: request.sender_id,
            body: request.body,
            image_url: request.image_url,
            audio_url: request.audio_url,
            audio_duration_ms: request.audio_duration_ms,
            timestamp: Some(ts(100 + n)),
            delivered: true,
            reply: request.reply,
        })
    }

    async fn fetch_messages(
        &self,
        conversation_id: &str,
        cursor: Option<String>,
    ) -> Result<MessagePage, RemoteError> {
        let state = self.state.lock().await;
        state
            .pages
            .get(&(conversation_id.to_string(), cursor.clone()))
            .cloned()
            .ok_or_else(|| RemoteError::Rejected(format!("no page for cursor {:?}", cursor)))
    }
}
