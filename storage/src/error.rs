//! Storage error types.
//!
//! Every store operation fails only with one of these; callers never see a swallowed fault.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O, lock or constraint failure reported by SQLite.
    #[error("Database error: {0}")]
    Database(String),
    /// A stored row could not be mapped back into a model.
    #[error("Decode error: {0}")]
    Decode(String),
    /// A JSON document kept in the preferences table is unreadable.
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => {
                StorageError::Decode(e.to_string())
            }
            other => StorageError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
