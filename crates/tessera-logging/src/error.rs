use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid filter: {0}")]
    Filter(String),

    #[error("Cannot open log file: {0}")]
    FileAppender(#[from] tracing_appender::rolling::InitError),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

impl LoggingError {
    pub(crate) fn filter(err: impl std::fmt::Display) -> Self {
        LoggingError::Filter(err.to_string())
    }
}
