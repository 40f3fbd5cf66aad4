mod build_info;
pub mod logging;
pub mod version;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to create rolling file appender in `{path}`")]
    Appender {
        path: String,
        #[source]
        source: tracing_appender::rolling::InitError,
    },

    #[error("Global tracing subscriber already initialized")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}
