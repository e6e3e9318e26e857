//! Integration tests for [`chat_sync::ChatRepository`].
//!
//! Uses an in-memory store and [`common::MockChatApi`] as the remote collaborator.

mod common;

use chat_core::{MessagePage, OutgoingMessage, ReplyPreview};
use chat_sync::{ChatRepository, SyncError};
use common::{memory_store, remote, ts, MockChatApi};
use futures::StreamExt;
use std::time::Duration;
use storage::{MessageRecord, StorageError};

async fn next_snapshot<S>(stream: &mut S) -> Vec<MessageRecord>
where
    S: futures::Stream<Item = Result<Vec<MessageRecord>, StorageError>> + Unpin,
{
    tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("Timed out waiting for snapshot")
        .expect("Stream ended")
        .expect("Snapshot query failed")
}

/// **Test: Send stores, forwards and reconciles into exactly one acknowledged row.**
///
/// **Setup:** Mock API acknowledging with `S1`.
/// **Action:** `send(text)`.
/// **Expected:** Returned row bears `S1`, a timestamp and the correlation id sent on the wire;
/// conversation has exactly one row.
#[tokio::test]
async fn test_send_reconciles_to_single_row() {
    let api = MockChatApi::new();
    let repo = ChatRepository::new(memory_store().await, api.clone());

    let sent = repo
        .send(OutgoingMessage::text("conv-1", "me", "dinner tonight?"))
        .await
        .expect("Failed to send");

    assert_eq!(sent.server_id.as_deref(), Some("S1"));
    assert!(sent.timestamp.is_some());
    assert!(sent.delivered);

    let requests = api.sent().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(
        sent.client_correlation_id.as_deref(),
        Some(requests[0].client_correlation_id.as_str())
    );

    let rows = repo.messages("conv-1").await.expect("Failed to read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].local_id, sent.local_id);
}

/// **Test: Ack without correlation echo still reconciles.**
///
/// **Setup:** Mock API that does not echo the correlation id.
/// **Action:** `send`.
/// **Expected:** One row bearing the server id.
#[tokio::test]
async fn test_send_reconciles_without_echo() {
    let api = MockChatApi::new();
    api.set_echo_correlation_id(false).await;
    let repo = ChatRepository::new(memory_store().await, api.clone());

    repo.send(OutgoingMessage::text("conv-1", "me", "hi"))
        .await
        .expect("Failed to send");

    let rows = repo.messages("conv-1").await.expect("Failed to read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].server_id.as_deref(), Some("S1"));
}

/// **Test: Remote failure leaves the provisional row; resend_pending later reconciles it.**
///
/// **Setup:** Failing mock API.
/// **Action:** `send` (fails); switch API to succeed; `resend_pending`.
/// **Expected:** `Err(Remote)` with one pending row; resend acknowledges 1 with the same
/// correlation id; still one row, now acknowledged.
#[tokio::test]
async fn test_failed_send_stays_pending_until_resend() {
    let api = MockChatApi::new();
    api.set_failing(true).await;
    let repo = ChatRepository::new(memory_store().await, api.clone());

    let result = repo
        .send(OutgoingMessage::image("conv-1", "me", "https://cdn.example/p.jpg"))
        .await;
    assert!(matches!(result, Err(SyncError::Remote(_))));

    let pending = repo.store().get_pending("conv-1").await.expect("Failed to read");
    assert_eq!(pending.len(), 1);
    let local_id = pending[0].local_id;

    api.set_failing(false).await;
    let acknowledged = repo.resend_pending("conv-1").await.expect("Failed to resend");
    assert_eq!(acknowledged, 1);

    let requests = api.sent().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].client_correlation_id,
        requests[1].client_correlation_id
    );

    let rows = repo.messages("conv-1").await.expect("Failed to read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].local_id, local_id);
    assert_eq!(rows[0].server_id.as_deref(), Some("S1"));
    assert_eq!(rows[0].image_url.as_deref(), Some("https://cdn.example/p.jpg"));
}

/// **Test: Messages from the other participant are inserted as new rows.**
#[tokio::test]
async fn test_apply_remote_inserts_incoming_messages() {
    let api = MockChatApi::new();
    let repo = ChatRepository::new(memory_store().await, api);

    repo.send(OutgoingMessage::text("conv-1", "me", "hello"))
        .await
        .expect("Failed to send");
    repo.apply_remote(remote("conv-1", "R1", 1))
        .await
        .expect("Failed to apply");
    // Pushed again (e.g. by a later fetch): no duplicate.
    repo.apply_remote(remote("conv-1", "R1", 1))
        .await
        .expect("Failed to apply");

    assert_eq!(repo.count("conv-1").await.expect("Failed to count"), 2);
}

/// **Test: An ack pushed before the send call returns does not duplicate the message.**
///
/// **Setup:** Provisional row already stored by `send`'s first step (simulated via the store).
/// **Action:** Apply the server's push (with correlation id), then the regular ack.
/// **Expected:** One row.
#[tokio::test]
async fn test_push_before_ack_is_merged() {
    let api = MockChatApi::new();
    let repo = ChatRepository::new(memory_store().await, api);

    let draft = MessageRecord::text("conv-1", "me", "on my way").with_correlation_id("C1");
    repo.store().upsert(&draft).await.expect("Failed to store provisional");

    let mut pushed = remote("conv-1", "S9", 3);
    pushed.sender_id = "me".to_string();
    pushed.body = Some("on my way".to_string());
    pushed.client_correlation_id = Some("C1".to_string());
    repo.apply_remote(pushed.clone()).await.expect("Failed to apply push");
    repo.apply_remote(pushed).await.expect("Failed to apply ack");

    let rows = repo.messages("conv-1").await.expect("Failed to read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].server_id.as_deref(), Some("S9"));
}

/// **Test: fetch merges a history page and returns the cursor.**
///
/// **Setup:** One locally sent message; mock page with 12 remote messages (one of them the ack
/// of the local send) and a next cursor.
/// **Action:** `fetch(conv, None)`.
/// **Expected:** 12 messages returned in ascending order; store holds 12 rows; cursor passed on.
#[tokio::test]
async fn test_fetch_merges_history_page() {
    let api = MockChatApi::new();
    api.set_failing(true).await;
    let repo = ChatRepository::new(memory_store().await, api.clone());

    let _ = repo.send(OutgoingMessage::text("conv-1", "me", "still there?")).await;
    let correlation_id = api.sent().await[0].client_correlation_id.clone();

    let mut messages: Vec<_> = (0..11).rev().map(|i| remote("conv-1", &format!("R{}", i), i)).collect();
    let mut own = remote("conv-1", "S-own", 20);
    own.sender_id = "me".to_string();
    own.body = Some("still there?".to_string());
    own.client_correlation_id = Some(correlation_id);
    messages.push(own);
    api.set_page(
        "conv-1",
        None,
        MessagePage {
            messages,
            next_cursor: Some("page-2".to_string()),
        },
    )
    .await;

    let page = repo.fetch("conv-1", None).await.expect("Failed to fetch");

    assert_eq!(page.next_cursor.as_deref(), Some("page-2"));
    assert_eq!(page.messages.len(), 12);
    assert_eq!(page.messages[0].timestamp, Some(ts(0)));
    assert_eq!(page.messages[11].server_id.as_deref(), Some("S-own"));
    assert_eq!(repo.count("conv-1").await.expect("Failed to count"), 12);
    assert!(repo.store().get_pending("conv-1").await.expect("Failed to read").is_empty());
}

/// **Test: fetch surfaces remote errors without touching the store.**
#[tokio::test]
async fn test_fetch_remote_error() {
    let api = MockChatApi::new();
    let repo = ChatRepository::new(memory_store().await, api);

    let result = repo.fetch("conv-1", Some("missing".to_string())).await;

    assert!(matches!(result, Err(SyncError::Remote(_))));
    assert_eq!(repo.count("conv-1").await.expect("Failed to count"), 0);
}

/// **Test: Observers see the provisional row, then the acknowledged one, never two rows.**
///
/// **Setup:** Observer on the conversation; failing mock API.
/// **Action:** `send` (fails), then enable the API and `resend_pending`.
/// **Expected:** Snapshots: empty, one provisional row, one acknowledged row.
#[tokio::test]
async fn test_observe_during_send() {
    let api = MockChatApi::new();
    api.set_failing(true).await;
    let repo = ChatRepository::new(memory_store().await, api.clone());
    let mut stream = repo.observe("conv-1");
    assert!(next_snapshot(&mut stream).await.is_empty());

    let _ = repo.send(OutgoingMessage::text("conv-1", "me", "hey")).await;

    let provisional = next_snapshot(&mut stream).await;
    assert_eq!(provisional.len(), 1);
    assert!(provisional[0].server_id.is_none());

    api.set_failing(false).await;
    repo.resend_pending("conv-1").await.expect("Failed to resend");

    let acknowledged = next_snapshot(&mut stream).await;
    assert_eq!(acknowledged.len(), 1);
    assert_eq!(acknowledged[0].server_id.as_deref(), Some("S1"));
}

/// **Test: Replies travel to the server and back into the stored row.**
#[tokio::test]
async fn test_send_with_reply() {
    let api = MockChatApi::new();
    let repo = ChatRepository::new(memory_store().await, api.clone());

    let sent = repo
        .send(
            OutgoingMessage::text("conv-1", "me", "sounds good").with_reply(ReplyPreview {
                message_id: Some("R0".to_string()),
                snippet: Some("coffee at 5?".to_string()),
                sender_name: Some("Sam".to_string()),
                ..Default::default()
            }),
        )
        .await
        .expect("Failed to send");

    assert_eq!(
        api.sent().await[0].reply.as_ref().and_then(|r| r.snippet.clone()),
        Some("coffee at 5?".to_string())
    );
    assert_eq!(
        sent.reply.and_then(|r| r.sender_name),
        Some("Sam".to_string())
    );
}

/// **Test: Pagination and clearing through the repository.**
#[tokio::test]
async fn test_page_recent_clear_and_purge() {
    let api = MockChatApi::new();
    let repo = ChatRepository::new(memory_store().await, api);
    let batch = (0..30).map(|i| remote("conv-1", &format!("R{}", i), i)).collect();
    repo.apply_remote_batch(batch).await.expect("Failed to apply batch");
    repo.apply_remote(remote("conv-2", "X1", 1))
        .await
        .expect("Failed to apply");

    let page = repo.page("conv-1", 10, 10).await.expect("Failed to page");
    assert_eq!(page.first().and_then(|m| m.timestamp.clone()), Some(ts(10)));
    let recent = repo.recent("conv-1", 5).await.expect("Failed to read recent");
    assert_eq!(recent.last().and_then(|m| m.timestamp.clone()), Some(ts(29)));

    assert_eq!(repo.clear_conversation("conv-1").await.expect("Failed to clear"), 30);
    assert_eq!(repo.purge().await.expect("Failed to purge"), 1);
}
