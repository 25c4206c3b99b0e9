//! Relayq Core Library
//!
//! This crate provides the domain models, backoff policy, configuration, and
//! error types shared by the relayq store backends and the scheduler.

pub mod backoff;
pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use backoff::BackoffPolicy;
pub use config::QueueConfig;
pub use error::{QueueError, QueueResult};
pub use models::{Event, NewRetryRecord, RetryRecord, Task, TaskBundle};
