//! Shared fixtures for storage integration tests.

#![allow(dead_code)]

use storage::{MessageRecord, MessageRepository};

/// Fresh repository on a private in-memory database with default policies (batch threshold 10).
pub async fn memory_repo() -> MessageRepository {
    MessageRepository::new("sqlite::memory:")
        .await
        .expect("Failed to create repository")
}

/// Fixed-width server timestamp for the `i`-th second after 2024-01-01 10:00:00.
pub fn ts(i: usize) -> String {
    format!("2024-01-01 {:02}:{:02}:{:02}", 10 + i / 3600, (i / 60) % 60, i % 60)
}

/// Acknowledged text message with server id `srv-{i}` and timestamp `ts(i)`.
pub fn acked(conversation_id: &str, i: usize) -> MessageRecord {
    MessageRecord::text(conversation_id, "user-b", format!("message {}", i))
        .with_server_id(format!("srv-{}", i))
        .with_timestamp(ts(i))
        .with_delivered(true)
}

/// Provisional text message with a correlation id and no timestamp.
pub fn provisional(conversation_id: &str, correlation_id: &str, body: &str) -> MessageRecord {
    MessageRecord::text(conversation_id, "user-a", body).with_correlation_id(correlation_id)
}

/// Installs a trigger that aborts any insert whose body is `boom`.
pub async fn install_failing_trigger(repo: &MessageRepository) {
    sqlx::query(
        r#"
        CREATE TRIGGER fail_on_boom BEFORE INSERT ON messages
        WHEN NEW.body = 'boom'
        BEGIN
            SELECT RAISE(ABORT, 'forced storage failure');
        END
        "#,
    )
    .execute(repo.pool())
    .await
    .expect("Failed to create trigger");
}
