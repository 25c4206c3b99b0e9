//! Error types module
//!
//! All retry-queue errors are unified under the `QueueError` enum. The
//! `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx`
//! feature; with `default-features = false` the `Storage` variant carries
//! backend failures as plain strings.

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid task: {0}")]
    InvalidTask(String),
}

impl QueueError {
    pub fn invalid_task(msg: impl Into<String>) -> Self {
        QueueError::InvalidTask(msg.into())
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
