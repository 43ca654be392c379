use crate::record::{EventSummary, LogRecord, LogType, Sequence, SequenceResult, SummaryTag};
use std::time::Instant;

pub const DEFAULT_RESULT_CODE: &str = "20000";
pub const DEFAULT_HTTP_STATUS: &str = "200";
pub const DEFAULT_RESULT: &str = "Success";
pub const HEALTHY: &str = "healthy";
pub const DEGRADED: &str = "degraded";
pub const NORMAL: &str = "normal";

/// Outcome passed to the summary flush. `None` fields fall back to what the
/// scope recorded earlier, then to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalStatus {
    /// Five-digit application result code, e.g. `"20000"`.
    pub code: Option<String>,
    pub http_status: Option<String>,
    /// Human-readable result; `"ok"` is normalised to `"Success"`.
    pub result: Option<String>,
    pub result_type: Option<String>,
    pub severity: Option<String>,
}

impl FinalStatus {
    /// Expand an HTTP status into code, status text and result.
    ///
    /// The result code is the status padded with zeros to five digits.
    /// Statuses outside the known set report `"Error"` as http status. An
    /// empty `message` is replaced by `Success` for 200 and by the
    /// snake_case reason phrase otherwise.
    pub fn from_http(status: u16, message: &str) -> Self {
        let known = matches!(
            status,
            200 | 400 | 401 | 403 | 404 | 409 | 429 | 500 | 501 | 503 | 504
        );
        let result = if !message.is_empty() {
            message.to_string()
        } else if status == 200 {
            DEFAULT_RESULT.to_string()
        } else {
            reason_snake_case(status)
        };

        Self {
            code: Some(pad_result_code(&status.to_string())),
            http_status: Some(if known {
                status.to_string()
            } else {
                "Error".to_string()
            }),
            result: Some(result),
            result_type: (status >= 500).then(|| DEGRADED.to_string()),
            severity: None,
        }
    }
}

fn pad_result_code(code: &str) -> String {
    format!("{:0<5}", code)
}

fn reason_snake_case(status: u16) -> String {
    let reason = match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => return "unknown".to_string(),
    };
    reason.to_lowercase().replace([' ', '-'], "_")
}

/// Collects downstream results for one scope, keyed by `(node, command)`.
#[derive(Debug, Default)]
pub struct SummaryAggregator {
    sequences: Vec<Sequence>,
}

impl SummaryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `tag` to the sequence for its `(node, command)`, creating the
    /// sequence on first use. Sequences keep first-seen order.
    pub fn record(&mut self, tag: SummaryTag) {
        let result = SequenceResult::from(&tag);
        if let Some(seq) = self
            .sequences
            .iter_mut()
            .find(|s| s.node == tag.node && s.command == tag.command)
        {
            seq.result.push(result);
            return;
        }
        self.sequences.push(Sequence {
            node: tag.node,
            command: tag.command,
            result: vec![result],
        });
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    /// Build the single summary record of the scope.
    ///
    /// Consumes the aggregator: a scope can produce at most one summary.
    pub fn flush(self, base: &LogRecord, started: Instant, status: FinalStatus) -> LogRecord {
        let mut record = base.clone();
        record.log_type = LogType::Summary;
        record.response_time = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        record.app_result_code = pick(status.code, &base.app_result_code, DEFAULT_RESULT_CODE);
        record.app_result_http_status =
            pick(status.http_status, &base.app_result_http_status, DEFAULT_HTTP_STATUS);
        record.app_result_type = pick(status.result_type, &base.app_result_type, HEALTHY);
        record.severity = pick(status.severity, &base.severity, NORMAL);
        record.app_result = match status.result {
            Some(r) if r.eq_ignore_ascii_case("ok") => DEFAULT_RESULT.to_string(),
            explicit => pick(explicit, &base.app_result, DEFAULT_RESULT),
        };

        let events: Vec<EventSummary> = self.sequences.into_iter().map(EventSummary::from).collect();
        record.message = serde_json::to_string(&events).unwrap_or_else(|_| "[]".to_string());

        record.clear_transient();
        record
    }
}

fn pick(explicit: Option<String>, earlier: &str, default: &str) -> String {
    match explicit {
        Some(v) if !v.is_empty() => v,
        _ if !earlier.is_empty() => earlier.to_string(),
        _ => default.to_string(),
    }
}
