//! Tracing setup: a rolling file sink under the configured log directory
//! plus stderr, both filtered by the configured verbosity level.
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Initialize the global tracing subscriber from `cfg`.
///
/// Returns a guard that must be kept alive for the process lifetime — the
/// non-blocking file writer flushes on drop, so dropping this early would
/// silently truncate the log.
pub fn init(cfg: &LogConfig) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&cfg.output)?;
    let file_appender = rolling::daily(Path::new(&cfg.output), "panther.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(cfg.filter_directive())?;

    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|err| anyhow::anyhow!("installing tracing subscriber: {err}"))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_directives_match_numeric_levels() {
        let mut cfg = LogConfig { output: String::new(), level: 1 };
        assert_eq!(cfg.filter_directive(), "debug");
        cfg.level = 2;
        assert_eq!(cfg.filter_directive(), "info");
        cfg.level = 3;
        assert_eq!(cfg.filter_directive(), "warn");
        cfg.level = 4;
        assert_eq!(cfg.filter_directive(), "error");
        cfg.level = 0;
        assert_eq!(cfg.filter_directive(), "info");
    }
}
