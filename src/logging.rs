//! Tracing setup. The terminal belongs to the UI, so events go to a log file
//! in the data directory instead of stderr.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber. Keep the returned guard alive for the
/// whole run or buffered lines are lost on exit.
pub fn init(config: &LoggingConfig, data_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(data_dir).context("failed to create data directory")?;

    let appender = tracing_appender::rolling::never(data_dir, &config.file);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;

    Ok(guard)
}
