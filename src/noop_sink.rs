use crate::error::SinkError;
use crate::sink::{Channel, Level, LineSink, LogLine, LogSink};
use async_trait::async_trait;

/// A sink that simply drops all lines.
///
/// Useful for measuring the overhead of scopes and the writer without any
/// external I/O, and for tests that don't care about output.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn send(&self, _line: &LogLine) -> Result<(), SinkError> {
        Ok(())
    }
}

impl LineSink for NoopSink {
    fn write_line(&self, _channel: Channel, _level: Level, _line: &str) {}
}
