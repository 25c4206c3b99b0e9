//! Backoff policy: maps an attempt count to the delay before the next
//! eligible retry time. Policies are monotonically non-decreasing in the
//! attempt count.

use chrono::Duration;

const DEFAULT_INITIAL_BACKOFF_SECS: i64 = 1;
const DEFAULT_MAX_BACKOFF_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Constant delay regardless of attempt count.
    Fixed { delay_secs: i64 },
    /// `initial * 2^(attempts - 1)`, capped at `max_secs`.
    Exponential { initial_secs: i64, max_secs: i64 },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            initial_secs: DEFAULT_INITIAL_BACKOFF_SECS,
            max_secs: DEFAULT_MAX_BACKOFF_SECS,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the next retry for a task on its `attempts`-th scheduling
    /// attempt. `attempts` is clamped to 1 at the low end.
    pub fn delay_for(&self, attempts: i32) -> Duration {
        let attempts = attempts.max(1);
        match *self {
            BackoffPolicy::Fixed { delay_secs } => Duration::seconds(delay_secs.max(0)),
            BackoffPolicy::Exponential {
                initial_secs,
                max_secs,
            } => {
                let exp = (attempts - 1).clamp(0, 62) as u32;
                let factor = 2_i64.checked_pow(exp).unwrap_or(i64::MAX);
                let secs = initial_secs.max(0).saturating_mul(factor).min(max_secs.max(0));
                Duration::seconds(secs)
            }
        }
    }
}
