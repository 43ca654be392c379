use crate::error::SinkError;
use crate::sink::{Channel, Level, LineSink, LogLine, LogSink};
use chrono::Utc;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

/// Buffering and batching parameters of a [`ChannelWriter`].
///
/// **Fields**
/// - `channel_buffer`: maximum number of queued lines before new lines are
///   dropped.
/// - `batch_size`: number of lines handed to the sink per batch.
/// - `flush_interval`: maximum delay before a partial batch is sent.
/// - `max_attempts`: delivery attempts per batch before it is discarded.
#[derive(Clone, Debug)]
pub struct WriterConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_attempts: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

/// [`LineSink`] that hands lines to an asynchronous [`LogSink`] through a
/// bounded channel and a background task.
///
/// `write_line` never blocks: when the channel is full the line is dropped
/// and counted. Dropping every clone of the writer closes the channel; the
/// background task then delivers what is left and exits.
#[derive(Clone)]
pub struct ChannelWriter {
    sender: mpsc::Sender<LogLine>,
    /// Total lines offered to the writer.
    pub total_lines: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_lines: Arc<AtomicU64>,
    /// Dropped because the channel was full or closed.
    pub dropped_lines: Arc<AtomicU64>,
    /// Discarded after `max_attempts` failed deliveries.
    pub failed_lines: Arc<AtomicU64>,
}

impl ChannelWriter {
    /// Create a writer and spawn the task that drains the channel into
    /// `sink`. Must be called inside a Tokio runtime.
    ///
    /// Minimal thresholds are enforced for `channel_buffer`, `batch_size`
    /// and `flush_interval` to avoid degenerate configurations.
    pub fn new(sink: Arc<dyn LogSink>, config: WriterConfig) -> (Self, JoinHandle<()>) {
        let buffer = config.channel_buffer.max(16);
        let batch_size = config.batch_size.max(1);
        let flush_interval = config.flush_interval.max(Duration::from_millis(10));
        let max_attempts = config.max_attempts.max(1);

        let (tx, mut rx) = mpsc::channel::<LogLine>(buffer);

        let total_lines = Arc::new(AtomicU64::new(0));
        let enqueued_lines = Arc::new(AtomicU64::new(0));
        let dropped_lines = Arc::new(AtomicU64::new(0));
        let failed_lines = Arc::new(AtomicU64::new(0));

        let failed_bg = Arc::clone(&failed_lines);

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let mut ticker = interval(flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(line) => {
                            batch.push(line);
                            if batch.len() >= batch_size {
                                deliver(&*sink, &mut batch, max_attempts, &failed_bg).await;
                            }
                        }
                        None => {
                            deliver(&*sink, &mut batch, max_attempts, &failed_bg).await;
                            if let Err(e) = sink.flush().await {
                                tracing::warn!(error = %e, "log sink flush failed on shutdown");
                            }
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        if !batch.is_empty() {
                            deliver(&*sink, &mut batch, max_attempts, &failed_bg).await;
                        }
                    }
                }
            }
        });

        (
            Self {
                sender: tx,
                total_lines,
                enqueued_lines,
                dropped_lines,
                failed_lines,
            },
            handle,
        )
    }
}

async fn deliver(
    sink: &dyn LogSink,
    batch: &mut Vec<LogLine>,
    max_attempts: u32,
    failed: &AtomicU64,
) {
    if batch.is_empty() {
        return;
    }
    if let Err(e) = send_batch(sink, batch, max_attempts).await {
        failed.fetch_add(batch.len() as u64, Ordering::Relaxed);
        tracing::warn!(error = %e, lines = batch.len(), "discarding log batch");
    }
    batch.clear();
}

/// Send every line in order; retry the remaining lines with exponential
/// backoff until `max_attempts` is reached.
async fn send_batch(
    sink: &dyn LogSink,
    batch: &mut Vec<LogLine>,
    max_attempts: u32,
) -> Result<(), SinkError> {
    let mut backoff = Duration::from_millis(100);
    let max_backoff = Duration::from_secs(10);
    let mut attempt = 1;

    loop {
        let mut sent = 0;
        let mut last_err = None;
        for line in batch.iter() {
            match sink.send(line).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    last_err = Some(e);
                    break;
                }
            }
        }
        batch.drain(..sent);

        match last_err {
            None => return Ok(()),
            Some(e) if attempt >= max_attempts => return Err(e),
            Some(e) => {
                tracing::debug!(error = %e, ?backoff, attempt, "log sink send failed, retrying");
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, max_backoff);
                attempt += 1;
            }
        }
    }
}

/// Warn on the first dropped line and then once per this many.
const DROP_WARN_EVERY: u64 = 1000;

fn should_warn(dropped: u64) -> bool {
    dropped == 1 || dropped % DROP_WARN_EVERY == 0
}

impl LineSink for ChannelWriter {
    fn write_line(&self, channel: Channel, level: Level, line: &str) {
        self.total_lines.fetch_add(1, Ordering::Relaxed);
        let queued = LogLine {
            channel,
            level,
            received_at: Utc::now(),
            line: line.to_string(),
        };
        match self.sender.try_send(queued) {
            Ok(()) => {
                self.enqueued_lines.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                let dropped = self.dropped_lines.fetch_add(1, Ordering::Relaxed) + 1;
                if !should_warn(dropped) {
                    return;
                }
                match err {
                    TrySendError::Full(_) => tracing::warn!(
                        channel = channel.as_str(),
                        dropped,
                        "log channel full, dropping lines"
                    ),
                    TrySendError::Closed(_) => tracing::warn!(
                        channel = channel.as_str(),
                        dropped,
                        "log writer task stopped, dropping lines"
                    ),
                }
            }
        }
    }
}
