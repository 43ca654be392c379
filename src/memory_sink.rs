use crate::error::SinkError;
use crate::sink::{Channel, Level, LineSink, LogLine, LogSink};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};

/// Keeps every line in memory, in write order.
///
/// Clones share the same buffer, so a test can hand one clone to a scope
/// and inspect the other.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<LogLine>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn channel(&self, channel: Channel) -> Vec<LogLine> {
        self.lines()
            .into_iter()
            .filter(|l| l.channel == channel)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, line: LogLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl LineSink for MemorySink {
    fn write_line(&self, channel: Channel, level: Level, line: &str) {
        self.push(LogLine {
            channel,
            level,
            received_at: Utc::now(),
            line: line.to_string(),
        });
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn send(&self, line: &LogLine) -> Result<(), SinkError> {
        self.push(line.clone());
        Ok(())
    }
}
