//! Retry scheduler: polling loop, claim, re-dispatch, reschedule on failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;

use relayq_core::config::QueueConfig;
use relayq_db::RetryStore;

use crate::dispatch::TaskDispatcher;

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Upper bound on how long the loop sleeps between polls. The loop wakes
    /// earlier whenever the store reports a closer deadline.
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
        }
    }
}

impl SchedulerConfig {
    pub fn from_queue_config(config: &QueueConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
        }
    }
}

/// Handle to a spawned scheduler loop.
pub struct RetryScheduler {
    shutdown_tx: mpsc::Sender<()>,
}

impl RetryScheduler {
    /// Spawn the scheduler loop on the current tokio runtime.
    pub fn start<S, D>(store: Arc<S>, dispatcher: Arc<D>, config: SchedulerConfig) -> Self
    where
        S: RetryStore + 'static,
        D: TaskDispatcher + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(run_loop(store, dispatcher, config, shutdown_rx));

        Self { shutdown_tx }
    }

    pub async fn shutdown(&self) {
        tracing::info!("Initiating retry scheduler shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn run_loop<S, D>(
    store: Arc<S>,
    dispatcher: Arc<D>,
    config: SchedulerConfig,
    mut shutdown_rx: mpsc::Receiver<()>,
) where
    S: RetryStore,
    D: TaskDispatcher,
{
    tracing::info!(
        poll_interval_secs = config.poll_interval.as_secs(),
        "Retry scheduler started"
    );

    loop {
        let wait = next_wait(store.as_ref(), config.poll_interval).await;

        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("Retry scheduler shutting down");
                break;
            }
            _ = sleep(wait) => {
                drain_due(store.as_ref(), dispatcher.as_ref()).await;
            }
        }
    }

    tracing::info!("Retry scheduler stopped");
}

/// How long to sleep before the next poll: the store's own estimate of the
/// time until the earliest deadline, capped at the poll interval.
async fn next_wait<S: RetryStore + ?Sized>(store: &S, poll_interval: Duration) -> Duration {
    match store.get_seconds_to_next_retry().await {
        Ok(Some(secs)) => Duration::from_secs(secs).min(poll_interval),
        Ok(None) => poll_interval,
        Err(e) => {
            tracing::error!(error = %e, "Failed to query next retry time");
            poll_interval
        }
    }
}

/// Claim and re-dispatch every currently due record.
async fn drain_due<S, D>(store: &S, dispatcher: &D)
where
    S: RetryStore + ?Sized,
    D: TaskDispatcher + ?Sized,
{
    loop {
        let bundle = match store.claim_retryable_task().await {
            Ok(Some(bundle)) => bundle,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim retryable task");
                break;
            }
        };

        let task = bundle.task();
        match dispatcher.dispatch(&task).await {
            Ok(()) => {
                // The claim already removed the record.
                tracing::info!(
                    record_id = %bundle.record.id,
                    channel = %task.event.channel_name,
                    plugin_name = %task.plugin_name,
                    attempts = bundle.record.attempts,
                    "Task re-dispatched successfully"
                );
            }
            Err(e) => {
                tracing::warn!(
                    record_id = %bundle.record.id,
                    channel = %task.event.channel_name,
                    plugin_name = %task.plugin_name,
                    error = %e,
                    "Task failed again, rescheduling"
                );
                match store.reschedule(&bundle.record).await {
                    Ok(Some(rescheduled)) => {
                        tracing::debug!(
                            record_id = %rescheduled.id,
                            attempts = rescheduled.attempts,
                            retry_at = %rescheduled.retry_at,
                            "Retry rescheduled"
                        );
                    }
                    // Retry budget spent; the store logged the abandonment.
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(
                            record_id = %bundle.record.id,
                            error = %e,
                            "Failed to reschedule task"
                        );
                    }
                }
            }
        }
    }
}
