//! PostgreSQL-backed retry store.
//!
//! One `task_retries` relation indexed on `(retry_at, id)`. Claiming uses
//! `FOR UPDATE SKIP LOCKED` plus a delete in the same transaction, so two
//! concurrent schedulers never both own a record.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use relayq_core::backoff::BackoffPolicy;
use relayq_core::config::QueueConfig;
use relayq_core::error::{QueueError, QueueResult};
use relayq_core::models::{NewRetryRecord, RetryRecord, TaskBundle};

use crate::store::RetryStore;

#[derive(Clone)]
pub struct PgRetryStore {
    pool: PgPool,
    backoff: BackoffPolicy,
    max_attempts: Option<i32>,
}

impl PgRetryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            backoff: BackoffPolicy::default(),
            max_attempts: None,
        }
    }

    pub fn with_config(pool: PgPool, config: &QueueConfig) -> Self {
        Self {
            pool,
            backoff: config.backoff(),
            max_attempts: config.max_attempts,
        }
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(pool: &PgPool) -> QueueResult<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| QueueError::Storage(e.to_string()))
    }
}

#[async_trait]
impl RetryStore for PgRetryStore {
    fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    fn max_attempts(&self) -> Option<i32> {
        self.max_attempts
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "task_retries", db.operation = "insert"))]
    async fn create(&self, record: NewRetryRecord) -> QueueResult<RetryRecord> {
        record.validate()?;

        let created = sqlx::query_as::<Postgres, RetryRecord>(
            r#"
            INSERT INTO task_retries (id, channel, plugin_name, payload, attempts, retry_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.channel)
        .bind(&record.plugin_name)
        .bind(&record.payload)
        .bind(record.attempts)
        .bind(record.retry_at)
        .fetch_one(&self.pool)
        .await?;

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

    #[tracing::instrument(skip(self), fields(db.table = "task_retries", db.operation = "select"))]
    async fn get_retryable_row(&self) -> QueueResult<Option<RetryRecord>> {
        // Single clock read for the whole due-check.
        let now = Utc::now();

        let row = sqlx::query_as::<Postgres, RetryRecord>(
            r#"
            SELECT * FROM task_retries
            WHERE retry_at <= $1
            ORDER BY retry_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "task_retries", db.operation = "delete"))]
    async fn claim_retryable_task(&self) -> QueueResult<Option<TaskBundle>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<Postgres, RetryRecord>(
            r#"
            SELECT * FROM task_retries
            WHERE retry_at <= $1
            ORDER BY retry_at ASC, id ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        match row {
            Some(record) => {
                sqlx::query("DELETE FROM task_retries WHERE id = $1")
                    .bind(record.id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;

                tracing::debug!(
                    record_id = %record.id,
                    channel = %record.channel,
                    plugin_name = %record.plugin_name,
                    "Retry record claimed"
                );

                Ok(Some(TaskBundle::from(record)))
            }
            None => {
                tx.rollback().await.ok();
                Ok(None)
            }
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "task_retries", db.operation = "select"))]
    async fn get_seconds_to_next_retry(&self) -> QueueResult<Option<u64>> {
        let now = Utc::now();

        let next: Option<chrono::DateTime<Utc>> =
            sqlx::query_scalar("SELECT MIN(retry_at) FROM task_retries")
                .fetch_one(&self.pool)
                .await?;

        Ok(next.map(|retry_at| (retry_at - now).num_seconds().max(0) as u64))
    }

    #[tracing::instrument(skip(self), fields(db.table = "task_retries", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> QueueResult<bool> {
        let result = sqlx::query("DELETE FROM task_retries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "task_retries", db.operation = "delete"))]
    async fn delete_all(&self) -> QueueResult<u64> {
        let result = sqlx::query("DELETE FROM task_retries")
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            tracing::info!(count = removed, "Cleared retry queue");
        }

        Ok(removed)
    }

    #[tracing::instrument(skip(self), fields(db.table = "task_retries", db.operation = "select"))]
    async fn count(&self) -> QueueResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_retries")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }
}
