//! The retry store contract.
//!
//! Backends implement the low-level operations (`create`, selection, claim,
//! delete); the failure-recording protocol (`save_task`, `reschedule`) and
//! bundle composition are provided as default methods so every backend
//! computes backoff identically.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use relayq_core::backoff::BackoffPolicy;
use relayq_core::error::QueueResult;
use relayq_core::models::{NewRetryRecord, RetryRecord, Task, TaskBundle};

#[async_trait]
pub trait RetryStore: Send + Sync {
    /// Backoff policy applied when scheduling and rescheduling tasks.
    fn backoff(&self) -> BackoffPolicy;

    /// Abandon a task once it has been scheduled this many times.
    /// `None` retries forever.
    fn max_attempts(&self) -> Option<i32>;

    /// Insert one record. Backends must make this atomic: the record is
    /// either fully persisted or not persisted at all. Implementations
    /// validate the record before writing.
    async fn create(&self, record: NewRetryRecord) -> QueueResult<RetryRecord>;

    /// The record with the smallest `retry_at` among records due now, or
    /// `None` if the store is empty or nothing is due yet. Ties are broken by
    /// lowest id. Non-destructive.
    async fn get_retryable_row(&self) -> QueueResult<Option<RetryRecord>>;

    /// Same selection as [`get_retryable_row`](Self::get_retryable_row), but
    /// select-and-remove happens as one atomic operation, so concurrent
    /// schedulers never both obtain the same record.
    async fn claim_retryable_task(&self) -> QueueResult<Option<TaskBundle>>;

    /// Seconds until the earliest `retry_at` across all records, clamped to
    /// zero; `None` when the store holds no records at all.
    async fn get_seconds_to_next_retry(&self) -> QueueResult<Option<u64>>;

    /// Remove one record by id; `false` if it was already gone.
    async fn delete(&self, id: Uuid) -> QueueResult<bool>;

    /// Administrative bulk clear; returns the number of records removed.
    async fn delete_all(&self) -> QueueResult<u64>;

    /// Number of records currently in the store.
    async fn count(&self) -> QueueResult<u64>;

    /// Record a first failure of `task`: one new record with `attempts = 1`
    /// due after the initial backoff delay.
    async fn save_task(&self, task: &Task) -> QueueResult<RetryRecord> {
        task.validate()?;
        let retry_at = Utc::now() + self.backoff().delay_for(1);
        self.create(NewRetryRecord {
            channel: task.event.channel_name.clone(),
            plugin_name: task.plugin_name.clone(),
            payload: task.event.payload.clone(),
            attempts: 1,
            retry_at,
        })
        .await
    }

    /// Record a repeat failure of a claimed task: a fresh record with the
    /// attempt count incremented and the deadline pushed out by the backoff
    /// policy. The new `retry_at` is never earlier than the previous one.
    ///
    /// Returns `Ok(None)` once the task has used up `max_attempts`; nothing
    /// is stored and the task is abandoned.
    async fn reschedule(&self, record: &RetryRecord) -> QueueResult<Option<RetryRecord>> {
        if let Some(max) = self.max_attempts() {
            if record.attempts >= max {
                tracing::error!(
                    record_id = %record.id,
                    channel = %record.channel,
                    plugin_name = %record.plugin_name,
                    attempts = record.attempts,
                    max_attempts = max,
                    "Task exhausted its retry budget, abandoning"
                );
                return Ok(None);
            }
        }

        let attempts = record.attempts.saturating_add(1);
        let retry_at = (Utc::now() + self.backoff().delay_for(attempts)).max(record.retry_at);
        let rescheduled = self
            .create(NewRetryRecord {
                channel: record.channel.clone(),
                plugin_name: record.plugin_name.clone(),
                payload: record.payload.clone(),
                attempts,
                retry_at,
            })
            .await?;
        Ok(Some(rescheduled))
    }

    /// The primary read entry point for the re-dispatch loop: the next due
    /// record wrapped as a task bundle, or `None` when nothing is due.
    async fn get_retryable_task(&self) -> QueueResult<Option<TaskBundle>> {
        Ok(self.get_retryable_row().await?.map(TaskBundle::from))
    }
}
