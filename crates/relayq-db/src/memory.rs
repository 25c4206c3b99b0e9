//! In-process retry store.
//!
//! Backs the unit-test suite and embedded single-process deployments. All
//! operations take the one store lock, which makes select-and-remove
//! naturally atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use relayq_core::backoff::BackoffPolicy;
use relayq_core::config::QueueConfig;
use relayq_core::error::QueueResult;
use relayq_core::models::{NewRetryRecord, RetryRecord, TaskBundle};

use crate::store::RetryStore;

pub struct MemoryRetryStore {
    records: Mutex<HashMap<Uuid, RetryRecord>>,
    backoff: BackoffPolicy,
    max_attempts: Option<i32>,
}

impl MemoryRetryStore {
    pub fn new() -> Self {
        Self::with_policy(BackoffPolicy::default(), None)
    }

    pub fn with_policy(backoff: BackoffPolicy, max_attempts: Option<i32>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            backoff,
            max_attempts,
        }
    }

    pub fn with_config(config: &QueueConfig) -> Self {
        Self::with_policy(config.backoff(), config.max_attempts)
    }

    /// Id of the due record with the smallest `(retry_at, id)` key, if any.
    fn next_due_id(records: &HashMap<Uuid, RetryRecord>, now: chrono::DateTime<Utc>) -> Option<Uuid> {
        records
            .values()
            .filter(|r| r.is_due(now))
            .min_by_key(|r| (r.retry_at, r.id))
            .map(|r| r.id)
    }
}

impl Default for MemoryRetryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RetryStore for MemoryRetryStore {
    fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    fn max_attempts(&self) -> Option<i32> {
        self.max_attempts
    }

    async fn create(&self, record: NewRetryRecord) -> QueueResult<RetryRecord> {
        record.validate()?;

        let now = Utc::now();
        let created = RetryRecord {
            id: Uuid::new_v4(),
            channel: record.channel,
            plugin_name: record.plugin_name,
            payload: record.payload,
            attempts: record.attempts,
            retry_at: record.retry_at,
            created_at: now,
            updated_at: now,
        };

        let mut records = self.records.lock().await;
        records.insert(created.id, created.clone());

        tracing::debug!(
            record_id = %created.id,
            channel = %created.channel,
            plugin_name = %created.plugin_name,
            attempts = created.attempts,
            retry_at = %created.retry_at,
            "Retry record created"
        );

        Ok(created)
    }

    async fn get_retryable_row(&self) -> QueueResult<Option<RetryRecord>> {
        let now = Utc::now();
        let records = self.records.lock().await;
        Ok(Self::next_due_id(&records, now).and_then(|id| records.get(&id).cloned()))
    }

    async fn claim_retryable_task(&self) -> QueueResult<Option<TaskBundle>> {
        let now = Utc::now();
        let mut records = self.records.lock().await;
        match Self::next_due_id(&records, now).and_then(|id| records.remove(&id)) {
            Some(record) => {
                tracing::debug!(
                    record_id = %record.id,
                    channel = %record.channel,
                    plugin_name = %record.plugin_name,
                    "Retry record claimed"
                );
                Ok(Some(TaskBundle::from(record)))
            }
            None => Ok(None),
        }
    }

    async fn get_seconds_to_next_retry(&self) -> QueueResult<Option<u64>> {
        let now = Utc::now();
        let records = self.records.lock().await;
        Ok(records
            .values()
            .map(|r| r.retry_at)
            .min()
            .map(|retry_at| (retry_at - now).num_seconds().max(0) as u64))
    }

    async fn delete(&self, id: Uuid) -> QueueResult<bool> {
        let mut records = self.records.lock().await;
        Ok(records.remove(&id).is_some())
    }

    async fn delete_all(&self) -> QueueResult<u64> {
        let mut records = self.records.lock().await;
        let removed = records.len() as u64;
        records.clear();
        if removed > 0 {
            tracing::info!(count = removed, "Cleared retry queue");
        }
        Ok(removed)
    }

    async fn count(&self) -> QueueResult<u64> {
        let records = self.records.lock().await;
        Ok(records.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use relayq_core::error::QueueError;
    use relayq_core::models::{Event, Task};

    fn bogus_record(retry_in_secs: i64) -> NewRetryRecord {
        NewRetryRecord {
            channel: "bogus".to_string(),
            plugin_name: "bogus".to_string(),
            payload: "bogus".to_string(),
            attempts: 1,
            retry_at: Utc::now() + Duration::seconds(retry_in_secs),
        }
    }

    #[tokio::test]
    async fn test_empty_store_has_no_next_retry() {
        let store = MemoryRetryStore::new();
        assert_eq!(store.get_seconds_to_next_retry().await.unwrap(), None);
        assert_eq!(store.get_retryable_row().await.unwrap(), None);
        assert_eq!(store.get_retryable_task().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_future_record_reports_wait_but_is_not_retryable() {
        let store = MemoryRetryStore::new();
        store.create(bogus_record(100)).await.unwrap();

        let secs = store.get_seconds_to_next_retry().await.unwrap().unwrap();
        assert!((98..=100).contains(&secs), "got {secs}");
        assert_eq!(store.get_retryable_row().await.unwrap(), None);
        assert_eq!(store.get_retryable_task().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_past_record_is_due_immediately() {
        let store = MemoryRetryStore::new();
        store
            .create(NewRetryRecord {
                channel: "build_started".to_string(),
                plugin_name: "bogus plugin".to_string(),
                payload: "123".to_string(),
                attempts: 1,
                retry_at: Utc::now() - Duration::seconds(100),
            })
            .await
            .unwrap();

        assert_eq!(store.get_seconds_to_next_retry().await.unwrap(), Some(0));

        let row = store.get_retryable_row().await.unwrap().unwrap();
        assert_eq!(row.channel, "build_started");
        assert_eq!(row.plugin_name, "bogus plugin");
        assert_eq!(row.payload, "123");
        assert_eq!(row.attempts, 1);

        let bundle = store.get_retryable_task().await.unwrap().unwrap();
        assert_eq!(bundle.event.channel_name, "build_started");
        assert_eq!(bundle.event.payload, "123");
        assert_eq!(bundle.plugin_name, "bogus plugin");
        assert_eq!(bundle.record.id, row.id);
    }

    #[tokio::test]
    async fn test_save_task_schedules_first_retry() {
        let store = MemoryRetryStore::new();
        let task = Task::new(Event::new("build_started", "1"), "FooPluginName");

        let before = Utc::now();
        let retry = store.save_task(&task).await.unwrap();

        assert_eq!(retry.channel, "build_started");
        assert_eq!(retry.plugin_name, "FooPluginName");
        assert_eq!(retry.payload, "1");
        assert_eq!(retry.attempts, 1);

        let offset = (retry.retry_at - before).num_seconds();
        assert!((1..=3).contains(&offset), "retry_at offset was {offset}s");
    }

    #[tokio::test]
    async fn test_save_task_rejects_malformed_descriptor() {
        let store = MemoryRetryStore::new();
        let task = Task::new(Event::new("", "1"), "FooPluginName");
        assert!(matches!(
            store.save_task(&task).await,
            Err(QueueError::InvalidTask(_))
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_equal_deadlines_select_lowest_id() {
        let store = MemoryRetryStore::new();
        let retry_at = Utc::now() - Duration::seconds(100);
        let mut record = bogus_record(0);
        record.retry_at = retry_at;

        let a = store.create(record.clone()).await.unwrap();
        let b = store.create(record).await.unwrap();
        let expected = a.id.min(b.id);

        let row = store.get_retryable_row().await.unwrap().unwrap();
        assert_eq!(row.id, expected);
        // Selection is stable across calls.
        let row = store.get_retryable_row().await.unwrap().unwrap();
        assert_eq!(row.id, expected);
    }

    #[tokio::test]
    async fn test_claim_removes_the_record() {
        let store = MemoryRetryStore::new();
        store.create(bogus_record(-100)).await.unwrap();
        store.create(bogus_record(-50)).await.unwrap();

        let first = store.claim_retryable_task().await.unwrap().unwrap();
        let second = store.claim_retryable_task().await.unwrap().unwrap();
        assert_ne!(first.record.id, second.record.id);
        assert!(first.record.retry_at <= second.record.retry_at);

        assert_eq!(store.claim_retryable_task().await.unwrap(), None);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reschedule_increments_attempts_and_never_moves_deadline_back() {
        let store = MemoryRetryStore::new();
        let task = Task::new(Event::new("build_started", "1"), "FooPluginName");
        let mut record = store.save_task(&task).await.unwrap();

        for _ in 0..5 {
            let previous_retry_at = record.retry_at;
            let previous_attempts = record.attempts;
            record = store.reschedule(&record).await.unwrap().unwrap();
            assert_eq!(record.attempts, previous_attempts + 1);
            assert!(record.retry_at >= previous_retry_at);
        }
    }

    #[tokio::test]
    async fn test_reschedule_stops_at_max_attempts() {
        let store = MemoryRetryStore::with_policy(BackoffPolicy::Fixed { delay_secs: 0 }, Some(2));
        let task = Task::new(Event::new("build_started", "1"), "FooPluginName");

        let first = store.save_task(&task).await.unwrap();
        let second = store.reschedule(&first).await.unwrap().unwrap();
        assert_eq!(second.attempts, 2);

        // Budget of 2 is spent; the task is abandoned, nothing stored.
        let count_before = store.count().await.unwrap();
        assert_eq!(store.reschedule(&second).await.unwrap(), None);
        assert_eq!(store.count().await.unwrap(), count_before);
    }

    #[tokio::test]
    async fn test_delete_all_clears_the_queue() {
        let store = MemoryRetryStore::new();
        store.create(bogus_record(-100)).await.unwrap();
        store.create(bogus_record(100)).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.get_seconds_to_next_retry().await.unwrap(), None);
        assert_eq!(store.get_retryable_task().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let store = MemoryRetryStore::new();
        let record = store.create(bogus_record(-1)).await.unwrap();

        assert!(store.delete(record.id).await.unwrap());
        assert!(!store.delete(record.id).await.unwrap());
    }
}
