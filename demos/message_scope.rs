//! A consumed message logged through a scope and delivered by a
//! [`ChannelWriter`] to the sink selected by `LOG_SINK_DSN`
//! (default `stdout://`).

use std::sync::Arc;

use request_scope_log::backend::{make_sink_from_config, parse_dsn};
use request_scope_log::env::{env_or, LOG_SINK_DSN_ENV};
use request_scope_log::writer::{ChannelWriter, WriterConfig};
use request_scope_log::{
    Correlation, LogAction, Masker, MaskingKey, MaskingRule, MaskingType, Origin, Scope,
    ScopeConfig, SummaryTag,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dsn = env_or(LOG_SINK_DSN_ENV, "stdout://");
    let sink = make_sink_from_config(&parse_dsn(&dsn)?)?;
    let (writer, handle) = ChannelWriter::new(sink, WriterConfig::default());

    let config = ScopeConfig::new("payment-consumer", Arc::new(writer.clone()), Arc::new(Masker::new(MaskingKey::from_env())))
        .with_version("0.3.0");

    let headers: Vec<(&str, Vec<u8>)> = vec![("x-transaction-id", b"pay-42".to_vec())];
    let mut scope = Scope::new(
        &config,
        Correlation::from_headers(headers),
        Origin::message("broker-1:9092", "payment.requested"),
    );

    let payload = serde_json::json!({"orderId": "o-42", "card": "4111111111111111"});
    scope.info(
        LogAction::consuming("payment.requested"),
        &payload,
        &[MaskingRule::new("card", MaskingType::CreditCard)],
    );
    scope.info(LogAction::producing("payment.completed"), &serde_json::json!({"orderId": "o-42"}), &[]);
    scope.set_summary(SummaryTag::new("kafka", "payment.completed", "200", "produced"));
    scope.end(200, "")?;

    // The scope's config holds the last writer clone.
    drop(scope);
    drop(config);
    drop(writer);
    handle.await?;
    Ok(())
}
