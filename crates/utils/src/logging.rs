//! provides logging helpers

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

use crate::LoggingError;

/// File name prefix of the rotated log files.
pub const LOG_FILE_PREFIX: &str = "pod-discovery.log";

/// Number of rotated log files kept on disk.
const MAX_LOG_FILES: usize = 3;

fn env_filter() -> filter::EnvFilter {
    filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy()
}

/// initiate the global tracing subscriber
///
/// Events always go to stderr. When `log_dir` is given they are additionally
/// written to a daily rotated file in that directory, and the returned guard
/// must be held until exit so buffered lines get flushed.
///
/// # Errors
///
/// - [`LoggingError::Appender`] if the log directory cannot be used
/// - [`LoggingError::AlreadyInitialized`] if a global subscriber is already set
pub fn init<P: AsRef<Path>>(log_dir: Option<P>) -> Result<Option<WorkerGuard>, LoggingError> {
    let stderr_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(env_filter());

    let Some(log_dir) = log_dir else {
        registry().with(stderr_layer).try_init()?;
        return Ok(None);
    };
    let log_dir = log_dir.as_ref();

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
        .map_err(|source| LoggingError::Appender {
            path: log_dir.display().to_string(),
            source,
        })?;

    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let file_layer = layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(env_filter());

    registry().with(stderr_layer).with(file_layer).try_init()?;
    Ok(Some(file_guard))
}
