use crate::env::{
    env_flag, env_or, LOG_DIR_ENV, LOG_ENABLE_FILE_ENV, LOG_ENABLE_STDOUT_ENV, LOG_LEVEL_ENV,
    LOG_ROTATION_ENV,
};
use crate::error::InitError;
use crate::sink::{DETAIL_TARGET, SUMMARY_TARGET};
use std::path::PathBuf;
use tracing::Metadata;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{filter_fn, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Layer, Registry};

/// How often the detail and summary files roll over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogRotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl LogRotation {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minutely" => Some(Self::Minutely),
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            "never" => Some(Self::Never),
            _ => None,
        }
    }

    fn to_rotation(self) -> Rotation {
        match self {
            Self::Minutely => Rotation::MINUTELY,
            Self::Hourly => Rotation::HOURLY,
            Self::Daily => Rotation::DAILY,
            Self::Never => Rotation::NEVER,
        }
    }
}

/// File output settings. Detail and summary lines go to separate files
/// named `<prefix>.<date>.log` inside `directory`.
#[derive(Clone, Debug)]
pub struct FileConfig {
    pub directory: PathBuf,
    pub detail_prefix: String,
    pub summary_prefix: String,
    pub rotation: LogRotation,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            detail_prefix: "detail".to_string(),
            summary_prefix: "summary".to_string(),
            rotation: LogRotation::Daily,
        }
    }
}

/// Configuration of the global subscriber installed by [`init_logging`].
///
/// **Fields**
/// - `level`: minimum level for detail lines and the crate's own events.
/// - `enable_stdout`: print detail and summary lines to stdout.
/// - `file`: if set, also write them to rolling files.
#[derive(Clone, Debug)]
pub struct LoggerConfig {
    pub level: String,
    pub enable_stdout: bool,
    pub file: Option<FileConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_stdout: true,
            file: None,
        }
    }
}

impl LoggerConfig {
    /// Build from `LOG_LEVEL`, `LOG_ENABLE_STDOUT`, `LOG_ENABLE_FILE`,
    /// `LOG_DIR` and `LOG_ROTATION`.
    pub fn from_env() -> Self {
        let file = env_flag(LOG_ENABLE_FILE_ENV, false).then(|| {
            let defaults = FileConfig::default();
            FileConfig {
                directory: PathBuf::from(env_or(LOG_DIR_ENV, "logs")),
                rotation: LogRotation::parse(&env_or(LOG_ROTATION_ENV, "daily"))
                    .unwrap_or(defaults.rotation),
                ..defaults
            }
        });
        Self {
            level: env_or(LOG_LEVEL_ENV, "info"),
            enable_stdout: env_flag(LOG_ENABLE_STDOUT_ENV, true),
            file,
        }
    }
}

/// Keeps the non-blocking file writers alive.
///
/// Must be held for the lifetime of the application so buffered lines are
/// flushed to disk before shutdown.
#[must_use]
pub struct LogGuard {
    _file_guards: Vec<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn is_stream(meta: &Metadata<'_>) -> bool {
    meta.target() == DETAIL_TARGET || meta.target() == SUMMARY_TARGET
}

/// Lines are already JSON documents; print only the message.
fn stream_layer<W>(writer: W, target: Option<&'static str>, level: LevelFilter) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_filter(filter_fn(move |meta| {
            let wanted = match target {
                Some(t) => meta.target() == t,
                None => is_stream(meta),
            };
            // Summary lines are written regardless of the detail level.
            wanted && (meta.target() == SUMMARY_TARGET || level >= *meta.level())
        }))
        .boxed()
}

/// Build the layers for `config` without installing them.
pub fn build_layers(config: &LoggerConfig) -> Result<(Vec<BoxedLayer>, LogGuard), InitError> {
    let level: LevelFilter = config
        .level
        .parse()
        .map_err(|_| InitError::Filter(config.level.clone()))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guards = Vec::new();

    // The crate's own diagnostics (warnings about scope misuse, dropped
    // lines) go to stderr in the usual fmt format.
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter_fn(move |meta| !is_stream(meta) && level >= *meta.level()))
            .boxed(),
    );

    if config.enable_stdout {
        layers.push(stream_layer(std::io::stdout, None, level));
    }

    if let Some(file) = &config.file {
        std::fs::create_dir_all(&file.directory).map_err(|source| InitError::LogDir {
            path: file.directory.display().to_string(),
            source,
        })?;
        for (target, prefix) in [
            (DETAIL_TARGET, &file.detail_prefix),
            (SUMMARY_TARGET, &file.summary_prefix),
        ] {
            let appender = RollingFileAppender::builder()
                .rotation(file.rotation.to_rotation())
                .filename_prefix(prefix.as_str())
                .filename_suffix("log")
                .build(&file.directory)
                .map_err(|e| InitError::Appender(e.to_string()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            layers.push(stream_layer(writer, Some(target), level));
        }
    }

    Ok((layers, LogGuard { _file_guards: guards }))
}

/// Install the global `tracing` subscriber described by `config`.
///
/// **Effects**
///
/// Detail and summary lines written through
/// [`TracingSink`](crate::sink::TracingSink) are printed to stdout and,
/// if configured, to their own rolling files. The returned [`LogGuard`]
/// must be kept alive.
pub fn init_logging(config: &LoggerConfig) -> Result<LogGuard, InitError> {
    let (layers, guard) = build_layers(config)?;
    let subscriber = Registry::default().with(layers);
    tracing::subscriber::set_global_default(subscriber).map_err(|_| InitError::AlreadyInstalled)?;
    Ok(guard)
}

/// Initialize logging with [`LoggerConfig::from_env`].
///
/// This is the recommended entrypoint for typical microservices.
pub fn init_logging_from_env() -> Result<LogGuard, InitError> {
    init_logging(&LoggerConfig::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{Channel, Level, LineSink, TracingSink};

    #[test]
    fn rejects_unknown_level() {
        let config = LoggerConfig {
            level: "loud".into(),
            ..Default::default()
        };
        assert!(matches!(build_layers(&config), Err(InitError::Filter(_))));
    }

    #[test]
    fn rotation_parses_names() {
        assert_eq!(LogRotation::parse("Hourly"), Some(LogRotation::Hourly));
        assert_eq!(LogRotation::parse("weekly"), None);
    }

    #[test]
    fn files_receive_their_own_stream() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggerConfig {
            level: "info".into(),
            enable_stdout: false,
            file: Some(FileConfig {
                directory: dir.path().to_path_buf(),
                rotation: LogRotation::Never,
                ..Default::default()
            }),
        };
        let (layers, guard) = build_layers(&config).unwrap();
        let subscriber = Registry::default().with(layers);

        tracing::subscriber::with_default(subscriber, || {
            let sink = TracingSink;
            sink.write_line(Channel::Detail, Level::Info, r#"{"logType":"detail"}"#);
            sink.write_line(Channel::Detail, Level::Debug, r#"{"hidden":true}"#);
            sink.write_line(Channel::Summary, Level::Info, r#"{"logType":"summary"}"#);
        });
        drop(guard);

        let detail = std::fs::read_to_string(dir.path().join("detail.log")).unwrap();
        let summary = std::fs::read_to_string(dir.path().join("summary.log")).unwrap();
        assert_eq!(detail.trim(), r#"{"logType":"detail"}"#);
        assert_eq!(summary.trim(), r#"{"logType":"summary"}"#);
    }
}
