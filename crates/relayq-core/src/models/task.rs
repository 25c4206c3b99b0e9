use serde::{Deserialize, Serialize};

use crate::error::{QueueError, QueueResult};
use crate::models::event::Event;

/// Task descriptor: one unit of retryable work, pairing an event with the
/// plugin responsible for handling it. Immutable; copied into a
/// [`RetryRecord`](crate::models::RetryRecord) when a failure is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub event: Event,
    pub plugin_name: String,
}

impl Task {
    pub fn new(event: Event, plugin_name: impl Into<String>) -> Self {
        Self {
            event,
            plugin_name: plugin_name.into(),
        }
    }

    /// Reject half-formed descriptors before anything is persisted.
    pub fn validate(&self) -> QueueResult<()> {
        if self.event.channel_name.trim().is_empty() {
            return Err(QueueError::invalid_task("channel name must not be empty"));
        }
        if self.plugin_name.trim().is_empty() {
            return Err(QueueError::invalid_task("plugin name must not be empty"));
        }
        Ok(())
    }
}
