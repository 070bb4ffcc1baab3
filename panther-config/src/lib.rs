//! Configuration loading and logging setup for `pantherd`.
pub mod config;
pub mod logging;

pub use config::{Config, ExecutorConfig, LogConfig, WebConfig};
