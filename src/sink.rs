use crate::error::SinkError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Output stream a line is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Detail,
    Summary,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Detail => "detail",
            Channel::Summary => "summary",
        }
    }
}

/// Severity of a detail line. Summary lines are always written at `Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous line-oriented writer shared by every scope in the process.
///
/// Scopes call `write_line` from whatever thread or task handles the
/// request, so implementations must accept concurrent calls and must not
/// block for long or panic. Each `line` is one complete JSON document.
pub trait LineSink: Send + Sync {
    fn write_line(&self, channel: Channel, level: Level, line: &str);
}

/// A serialized line queued for asynchronous delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub channel: Channel,
    pub level: Level,
    pub received_at: DateTime<Utc>,
    /// The JSON document exactly as the scope produced it.
    pub line: String,
}

/// Asynchronous destination for [`LogLine`]s queued by
/// [`ChannelWriter`](crate::writer::ChannelWriter).
///
/// Implementations are responsible for transporting lines to a concrete
/// backend (ClickHouse, stdout, etc). The writer calls `send` from a
/// background task and never awaits it on the request path.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single line to the underlying backend.
    ///
    /// **Returns**
    /// - `Ok(())` if the line was accepted by the backend.
    /// - `Err(..)` if the backend failed. The writer treats this as a
    ///   transient failure and retries the batch with backoff.
    async fn send(&self, line: &LogLine) -> Result<(), SinkError>;

    /// Flush any buffered lines, if the backend implements buffering.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Forwards lines as `tracing` events with target `detail` or `summary`.
///
/// Pair with [`init_logging`](crate::init::init_logging), which routes each
/// target to stdout and its own rolling file.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

pub const DETAIL_TARGET: &str = "detail";
pub const SUMMARY_TARGET: &str = "summary";

impl LineSink for TracingSink {
    fn write_line(&self, channel: Channel, level: Level, line: &str) {
        match (channel, level) {
            (Channel::Summary, _) => tracing::info!(target: SUMMARY_TARGET, "{}", line),
            (Channel::Detail, Level::Debug) => tracing::debug!(target: DETAIL_TARGET, "{}", line),
            (Channel::Detail, Level::Info) => tracing::info!(target: DETAIL_TARGET, "{}", line),
            (Channel::Detail, Level::Error) => tracing::error!(target: DETAIL_TARGET, "{}", line),
        }
    }
}

/// Writes every line to stdout, prefixed by its stream name.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

#[async_trait]
impl LogSink for StdoutSink {
    async fn send(&self, line: &LogLine) -> Result<(), SinkError> {
        println!("[{}] {}", line.channel.as_str(), line.line);
        Ok(())
    }
}
