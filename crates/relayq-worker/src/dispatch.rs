//! Task dispatcher trait
//!
//! The event/dispatch layer implements this trait. The scheduler calls
//! `dispatch` for each claimed task; an `Err` means the plugin failed again
//! and the task goes back into the queue with backoff.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use relayq_core::models::Task;

/// Hands a reconstructed task to the plugin responsible for it.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn dispatch(&self, task: &Task) -> Result<()>;
}

/// Placeholder dispatcher used when no real dispatch layer exists yet
/// (e.g. during init). Dispatch always errors, so tasks stay queued.
pub struct NoopDispatcher;

#[async_trait]
impl TaskDispatcher for NoopDispatcher {
    async fn dispatch(&self, task: &Task) -> Result<()> {
        Err(anyhow!(
            "NoopDispatcher: no dispatcher configured for plugin {}",
            task.plugin_name
        ))
    }
}
