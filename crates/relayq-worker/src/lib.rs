//! Relayq Worker
//!
//! The re-dispatch loop: sleeps until the next retry record is due, claims
//! it, and hands the reconstructed task to a [`TaskDispatcher`]. Failed
//! dispatches are rescheduled through the store's backoff policy.

pub mod dispatch;
pub mod scheduler;

pub use dispatch::{NoopDispatcher, TaskDispatcher};
pub use scheduler::{RetryScheduler, SchedulerConfig};
