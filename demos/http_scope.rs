//! One HTTP request handled through a scope, printed by the global
//! subscriber: two detail lines and one summary line on stdout.
//!
//! Run with `LOG_ENABLE_FILE=true` to also get `logs/detail.*.log` and
//! `logs/summary.*.log`.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use request_scope_log::dispatch::{self, HandlerError, Reply};
use request_scope_log::init::init_logging_from_env;
use request_scope_log::{
    Correlation, DbOperation, LogAction, Masker, MaskingKey, MaskingRule, MaskingType, Origin,
    Scope, ScopeConfig, SummaryTag, TracingSink,
};
use serde::Serialize;

#[derive(Serialize)]
struct CreateUser {
    name: String,
    email: String,
    phone: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = init_logging_from_env()?;

    let config = ScopeConfig::from_env(
        Arc::new(TracingSink),
        Arc::new(Masker::new(MaskingKey::from_env())),
    );

    let headers = [
        ("x-transaction-id", "demo-tx-1"),
        ("user-agent", "curl/8.4.0"),
        ("host", "localhost:8080"),
    ];
    let scope = Scope::new(
        &config,
        Correlation::from_headers(headers),
        Origin::http_from_headers("POST", "/v1/users", headers).with_remote_addr("127.0.0.1:53012"),
    );

    let body = CreateUser {
        name: "Somchai".into(),
        email: "somchai@example.com".into(),
        phone: "0812345678".into(),
    };
    let rules = [
        MaskingRule::new("name", MaskingType::FirstName),
        MaskingRule::new("email", MaskingType::Email),
        MaskingRule::new("phone", MaskingType::Msisdn),
    ];

    let outcome = dispatch::run_async(scope, Duration::from_secs(2), |s| {
        async move {
            s.info(LogAction::inbound("create user"), &body, &rules);
            let started = std::time::Instant::now();
            tokio::time::sleep(Duration::from_millis(15)).await;
            s.info(
                LogAction::db_response(DbOperation::Create, "insert_user"),
                &serde_json::json!({"inserted": 1}),
                &[],
            );
            s.set_summary(
                SummaryTag::new("postgres", "insert_user", "200", "success")
                    .with_response_time(started.elapsed().as_micros() as u64),
            );
            if body.email.is_empty() {
                return Err(HandlerError::new(400, "email is required"));
            }
            Ok(Reply::ok())
        }
        .boxed()
    })
    .await;

    eprintln!("request finished with status {}", outcome.status());
    Ok(())
}
