use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};
use crate::models::event::Event;
use crate::models::task::Task;

/// The durable entity tracking one failed task awaiting re-dispatch.
///
/// A record exists from the moment a failure is first recorded until the task
/// is processed successfully (deleted by the dispatcher) or purged. Identity
/// is solely by `id`; duplicate `(channel, plugin_name, payload)` triples are
/// legal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryRecord {
    pub id: Uuid,
    pub channel: String,
    pub plugin_name: String,
    pub payload: String,
    /// Scheduling attempts so far; `>= 1` always.
    pub attempts: i32,
    /// Absolute point in time at which the record becomes due.
    pub retry_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RetryRecord {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.retry_at <= now
    }

    /// Seconds from `now` until this record is due, clamped to zero.
    pub fn seconds_until_due(&self, now: DateTime<Utc>) -> u64 {
        (self.retry_at - now).num_seconds().max(0) as u64
    }

    /// Rebuild the task descriptor this record was saved from.
    pub fn to_task(&self) -> Task {
        Task::new(
            Event::new(self.channel.clone(), self.payload.clone()),
            self.plugin_name.clone(),
        )
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for RetryRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(RetryRecord {
            id: row.try_get("id")?,
            channel: row.try_get("channel")?,
            plugin_name: row.try_get("plugin_name")?,
            payload: row.try_get("payload")?,
            attempts: row.try_get("attempts")?,
            retry_at: row.try_get("retry_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Insert shape for a retry record; the store assigns `id` and the
/// bookkeeping timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRetryRecord {
    pub channel: String,
    pub plugin_name: String,
    pub payload: String,
    pub attempts: i32,
    pub retry_at: DateTime<Utc>,
}

impl NewRetryRecord {
    /// Caller-contract checks applied by every backend before persisting.
    pub fn validate(&self) -> QueueResult<()> {
        if self.channel.trim().is_empty() {
            return Err(QueueError::invalid_task("channel name must not be empty"));
        }
        if self.plugin_name.trim().is_empty() {
            return Err(QueueError::invalid_task("plugin name must not be empty"));
        }
        if self.attempts < 1 {
            return Err(QueueError::invalid_task("attempts must be at least 1"));
        }
        Ok(())
    }
}

/// What the re-dispatch loop receives for a due record: the reconstructed
/// event, the plugin to hand it to, and the underlying record so the caller
/// can delete or reschedule it after processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskBundle {
    pub event: Event,
    pub plugin_name: String,
    pub record: RetryRecord,
}

impl TaskBundle {
    pub fn task(&self) -> Task {
        Task::new(self.event.clone(), self.plugin_name.clone())
    }
}

impl From<RetryRecord> for TaskBundle {
    fn from(record: RetryRecord) -> Self {
        Self {
            event: Event::new(record.channel.clone(), record.payload.clone()),
            plugin_name: record.plugin_name.clone(),
            record,
        }
    }
}
