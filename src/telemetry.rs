//! Log output for a pipeline run
//!
//! Every run builds its own `Dispatch` from a `LogConfig` and executes under
//! it, so nothing is registered globally and building it twice never doubles
//! the output.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::Dispatch;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{
    DEFAULT_LOG_DIR, DEFAULT_LOG_FILTER, LOG_FILE_PREFIX, LOG_FILE_SUFFIX, LOG_RETENTION_FILES,
    LOG_TIMESTAMP_FORMAT,
};

/// Where and how much to log
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory for the daily log files; `None` logs to the console only
    pub directory: Option<PathBuf>,
    /// `EnvFilter` directives, e.g. `data_pipeline=info,sqlx=warn`
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: Some(PathBuf::from(DEFAULT_LOG_DIR)),
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Build the dispatcher for one run: stderr plus, when a directory is set, a
/// daily-rotating file keeping the last `LOG_RETENTION_FILES` days
pub fn build_dispatch(config: &LogConfig) -> Result<Dispatch> {
    let filter = EnvFilter::try_new(&config.filter)
        .with_context(|| format!("Invalid log filter '{}'", config.filter))?;
    let timer = ChronoLocal::new(LOG_TIMESTAMP_FORMAT.to_string());

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(timer.clone());

    let file_layer = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).with_context(|| {
                format!("Failed to create log directory {}", directory.display())
            })?;

            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix(LOG_FILE_SUFFIX)
                .max_log_files(LOG_RETENTION_FILES)
                .build(directory)
                .with_context(|| {
                    format!("Failed to open log file in {}", directory.display())
                })?;

            Some(
                fmt::layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .with_timer(timer),
            )
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer);

    Ok(Dispatch::new(subscriber))
}
