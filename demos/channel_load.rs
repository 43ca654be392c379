use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;

use request_scope_log::noop_sink::NoopSink;
use request_scope_log::writer::{ChannelWriter, WriterConfig};
use request_scope_log::{Correlation, LogAction, Masker, Origin, Scope, ScopeConfig};

#[tokio::main]
async fn main() {
    let config = WriterConfig {
        channel_buffer: 50_000,
        batch_size: 1_000,
        flush_interval: Duration::from_millis(200),
        ..Default::default()
    };
    let (writer, handle) = ChannelWriter::new(Arc::new(NoopSink), config);
    let scope_config = ScopeConfig::new("load-test", Arc::new(writer.clone()), Arc::new(Masker::default()));

    let n: u64 = 20_000;
    let start = Instant::now();

    for i in 0..n {
        let mut scope = Scope::new(&scope_config, Correlation::default(), Origin::http("GET", "/load"));
        scope.info(LogAction::inbound("load"), &i, &[]);
        scope.info(LogAction::outbound("load"), "ok", &[]);
        let _ = scope.end(200, "");
    }

    let elapsed = start.elapsed();
    println!(
        "channel load: {} scopes ({} lines) in {:?} (~{:.0} lines/s)",
        n,
        writer.total_lines.load(Ordering::Relaxed),
        elapsed,
        writer.total_lines.load(Ordering::Relaxed) as f64 / elapsed.as_secs_f64()
    );

    let dropped = Arc::clone(&writer.dropped_lines);
    drop(scope_config);
    drop(writer);
    let _ = handle.await;
    println!("dropped: {}", dropped.load(Ordering::Relaxed));
}
