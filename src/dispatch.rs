//! Dispatch-boundary adapter that guarantees one summary per scope.
//!
//! Handlers return `Result<Reply, HandlerError>`. Whatever happens inside
//! them (normal return, handled error, panic, or an expired deadline) the
//! adapter finalizes the scope exactly once with a matching status.

use crate::action::LogAction;
use crate::scope::Scope;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// Successful handler result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub message: String,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            status: 200,
            message: String::new(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            message: String::new(),
        }
    }
}

/// Error a handler chose to report; becomes the summary outcome.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{status}: {message}")]
pub struct HandlerError {
    pub status: u16,
    pub message: String,
}

impl HandlerError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// What the dispatcher observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed(u16),
    Failed(HandlerError),
    Panicked(String),
    TimedOut,
}

impl DispatchOutcome {
    /// HTTP status to answer the caller with.
    pub fn status(&self) -> u16 {
        match self {
            DispatchOutcome::Completed(status) => *status,
            DispatchOutcome::Failed(err) => err.status,
            DispatchOutcome::Panicked(_) => 500,
            DispatchOutcome::TimedOut => 504,
        }
    }
}

/// Run a synchronous handler. Panics are caught and reported as 500.
pub fn run<F>(mut scope: Scope, handler: F) -> DispatchOutcome
where
    F: FnOnce(&mut Scope) -> Result<Reply, HandlerError>,
{
    let mut reply_message = None;
    let result = panic::catch_unwind(AssertUnwindSafe(|| handler(&mut scope)));
    let outcome = match result {
        Ok(Ok(reply)) => {
            reply_message = Some(reply.message);
            DispatchOutcome::Completed(reply.status)
        }
        Ok(Err(err)) => DispatchOutcome::Failed(err),
        Err(payload) => DispatchOutcome::Panicked(panic_message(payload)),
    };
    finish(&mut scope, &outcome, reply_message.as_deref());
    outcome
}

/// Run an asynchronous handler under `timeout`.
///
/// A panic inside the future is reported as 500, an expired deadline as
/// 504. In both cases the handler future is dropped before the summary is
/// written.
pub async fn run_async<F>(mut scope: Scope, timeout: Duration, handler: F) -> DispatchOutcome
where
    F: for<'a> FnOnce(&'a mut Scope) -> BoxFuture<'a, Result<Reply, HandlerError>>,
{
    let mut reply_message = None;
    let outcome = {
        let guarded = AssertUnwindSafe(handler(&mut scope)).catch_unwind();
        match tokio::time::timeout(timeout, guarded).await {
            Ok(Ok(Ok(reply))) => {
                reply_message = Some(reply.message);
                DispatchOutcome::Completed(reply.status)
            }
            Ok(Ok(Err(err))) => DispatchOutcome::Failed(err),
            Ok(Err(payload)) => DispatchOutcome::Panicked(panic_message(payload)),
            Err(_) => DispatchOutcome::TimedOut,
        }
    };
    finish(&mut scope, &outcome, reply_message.as_deref());
    outcome
}

fn finish(scope: &mut Scope, outcome: &DispatchOutcome, reply_message: Option<&str>) {
    if scope.is_finalized() {
        return;
    }
    let message = match outcome {
        DispatchOutcome::Completed(_) => reply_message.unwrap_or_default().to_string(),
        DispatchOutcome::Failed(err) => {
            scope.error(LogAction::exception("handler error"), &err.message, &[]);
            err.message.clone()
        }
        DispatchOutcome::Panicked(msg) => {
            scope.error(LogAction::exception("handler panicked"), msg, &[]);
            "internal server error".to_string()
        }
        DispatchOutcome::TimedOut => {
            scope.error(LogAction::exception("request timed out"), "deadline exceeded", &[]);
            "request timed out".to_string()
        }
    };
    // Checked above; a second finalization cannot happen here.
    let _ = scope.end(outcome.status(), &message);
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::{Correlation, Origin};
    use crate::masking::{Masker, MaskingKey};
    use crate::memory_sink::MemorySink;
    use crate::scope::ScopeConfig;
    use crate::sink::Channel;
    use serde_json::Value;
    use std::sync::Arc;

    fn scope(sink: &MemorySink) -> Scope {
        let config = ScopeConfig::new(
            "user-service",
            Arc::new(sink.clone()),
            Arc::new(Masker::new(MaskingKey::none())),
        );
        Scope::new(&config, Correlation::default(), Origin::http("GET", "/users/1"))
    }

    fn summary(sink: &MemorySink) -> Value {
        let lines = sink.channel(Channel::Summary);
        assert_eq!(lines.len(), 1, "expected exactly one summary line");
        serde_json::from_str(&lines[0].line).unwrap()
    }

    #[test]
    fn handler_error_becomes_outcome() {
        let sink = MemorySink::new();
        let outcome = run(scope(&sink), |_| Err(HandlerError::new(404, "user not found")));

        assert_eq!(outcome.status(), 404);
        let s = summary(&sink);
        assert_eq!(s["appResultCode"], "40400");
        assert_eq!(s["appResult"], "user not found");
        assert_eq!(sink.channel(Channel::Detail).len(), 1);
    }

    #[test]
    fn handler_that_ends_itself_is_not_flushed_again() {
        let sink = MemorySink::new();
        let outcome = run(scope(&sink), |s| {
            s.end(201, "").map_err(|e| HandlerError::new(500, e.to_string()))?;
            Ok(Reply::status(201))
        });
        assert_eq!(outcome, DispatchOutcome::Completed(201));
        assert_eq!(summary(&sink)["appResultCode"], "20100");
    }

    #[tokio::test]
    async fn async_panic_is_caught() {
        let sink = MemorySink::new();
        let outcome = run_async(scope(&sink), Duration::from_secs(5), |_s| {
            async move {
                if true {
                    panic!("repository exploded");
                }
                Ok(Reply::ok())
            }
            .boxed()
        })
        .await;

        assert_eq!(outcome, DispatchOutcome::Panicked("repository exploded".into()));
        assert_eq!(summary(&sink)["appResultCode"], "50000");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_yields_gateway_timeout() {
        let sink = MemorySink::new();
        let outcome = run_async(scope(&sink), Duration::from_millis(50), |s| {
            async move {
                s.info(LogAction::outbound("slow call"), "waiting", &[]);
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Reply::ok())
            }
            .boxed()
        })
        .await;

        assert_eq!(outcome, DispatchOutcome::TimedOut);
        let s = summary(&sink);
        assert_eq!(s["appResultCode"], "50400");
        assert_eq!(s["appResult"], "request timed out");
        assert_eq!(sink.channel(Channel::Detail).len(), 2);
    }
}
