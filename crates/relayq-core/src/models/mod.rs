pub mod event;
pub mod retry;
pub mod task;

pub use event::Event;
pub use retry::{NewRetryRecord, RetryRecord, TaskBundle};
pub use task::Task;
