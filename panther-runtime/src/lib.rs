//! The worker pool and watch-driven scheduler that turn storage events into
//! host scans and command executions.
pub mod dispatch;
pub mod handlers;
pub mod pool;
pub mod schedule;

pub use dispatch::Dispatcher;
pub use handlers::Handlers;
pub use pool::{Job, JobSender, Pool, DEFAULT_WORKERS, MIN_WORKERS};
pub use schedule::Cron;
