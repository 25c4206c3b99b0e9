//! Configuration module
//!
//! Environment-driven settings for the retry queue and its scheduler. Every
//! knob has a coded default so an empty environment yields a working queue.

use std::env;
use std::str::FromStr;

use crate::backoff::BackoffPolicy;

const DEFAULT_INITIAL_BACKOFF_SECS: i64 = 1;
const DEFAULT_MAX_BACKOFF_SECS: i64 = 3600;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Delay before the first retry of a freshly failed task.
    pub initial_backoff_secs: i64,
    /// Upper bound on the backoff delay, however many attempts a task has.
    pub max_backoff_secs: i64,
    /// Abandon a task once it has been scheduled this many times.
    /// `None` retries forever.
    pub max_attempts: Option<i32>,
    /// Upper bound on how long the scheduler sleeps between polls.
    pub poll_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            initial_backoff_secs: DEFAULT_INITIAL_BACKOFF_SECS,
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
            max_attempts: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl QueueConfig {
    /// Build from `RELAYQ_*` environment variables, falling back to defaults
    /// for anything unset or unparsable. `RELAYQ_MAX_ATTEMPTS=0` (or unset)
    /// means retry forever.
    pub fn from_env() -> Self {
        let max_attempts = match env_parse::<i32>("RELAYQ_MAX_ATTEMPTS", 0) {
            n if n > 0 => Some(n),
            _ => None,
        };

        Self {
            initial_backoff_secs: env_parse(
                "RELAYQ_INITIAL_BACKOFF_SECS",
                DEFAULT_INITIAL_BACKOFF_SECS,
            ),
            max_backoff_secs: env_parse("RELAYQ_MAX_BACKOFF_SECS", DEFAULT_MAX_BACKOFF_SECS),
            max_attempts,
            poll_interval_secs: env_parse("RELAYQ_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::Exponential {
            initial_secs: self.initial_backoff_secs,
            max_secs: self.max_backoff_secs,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
