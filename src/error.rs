/// Lifecycle misuse of a [`Scope`](crate::scope::Scope).
///
/// Masking and serialization problems never surface here; they are
/// recovered inside the detail logger. The only reportable error is a
/// scope being finalized twice.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("scope already finalized; summary was flushed before")]
    AlreadyFinalized,
}

/// Error returned by an asynchronous [`LogSink`](crate::sink::LogSink)
/// backend when a line could not be delivered.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "clickhouse")]
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend rejected line: {0}")]
    Rejected(String),
}

/// Error raised while installing the global logging subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to create log directory {path}: {source}")]
    LogDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid log level: {0}")]
    Filter(String),

    #[error("failed to create rolling file appender: {0}")]
    Appender(String),

    #[error("global subscriber already installed")]
    AlreadyInstalled,
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DsnError {
    #[error("unknown or unsupported DSN scheme")]
    UnknownScheme,
}

/// Error type returned when building a backend sink from configuration.
#[derive(thiserror::Error, Debug)]
pub enum BackendBuildError {
    #[error("clickhouse feature is not enabled")]
    ClickhouseFeatureDisabled,
}
