use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Which of the two output streams a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    #[default]
    Detail,
    Summary,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Detail => "detail",
            LogType::Summary => "summary",
        }
    }
}

/// Request or message context attached to a detail entry.
///
/// Populated from the HTTP request or the consumed message that opened the
/// scope. Cleared after every detail emission, so only the first line of a
/// scope carries it unless the caller sets it again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Raw payload of the consumed message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(rename = "clientIP", default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        *self == Metadata::default()
    }
}

/// One line of either log stream.
///
/// The same record instance lives for the whole scope: identity and
/// correlation fields are set once, the action fields are overwritten by
/// every detail emission, and the summary flush fills in the aggregate
/// result fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub log_type: LogType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub component: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub component_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action_description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sub_action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance: String,
    /// `proto://host` of an HTTP request, broker address of a message.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub span_id: String,

    /// Elapsed microseconds since scope creation; summary records only.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub response_time: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_result: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_result_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_result_http_status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_result_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub severity: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub use_case: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub use_case_step: String,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

/// Named, typed replacement for setting record fields by string key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    AppResult,
    AppResultCode,
    AppResultHttpStatus,
    AppResultType,
    Severity,
    UseCase,
    UseCaseStep,
    Component,
    Environment,
}

impl LogRecord {
    pub fn set(&mut self, field: RecordField, value: impl Into<String>) {
        let value = value.into();
        match field {
            RecordField::AppResult => self.app_result = value,
            RecordField::AppResultCode => self.app_result_code = value,
            RecordField::AppResultHttpStatus => self.app_result_http_status = value,
            RecordField::AppResultType => self.app_result_type = value,
            RecordField::Severity => self.severity = value,
            RecordField::UseCase => self.use_case = value,
            RecordField::UseCaseStep => self.use_case_step = value,
            RecordField::Component => self.component = value,
            RecordField::Environment => self.environment = value,
        }
    }

    /// Clears the per-emission fields so only identity and aggregate data
    /// remain.
    pub(crate) fn clear_transient(&mut self) {
        self.action.clear();
        self.action_description.clear();
        self.sub_action.clear();
        self.timestamp = None;
        self.level.clear();
        self.metadata = Metadata::default();
    }
}

/// One unit of downstream work reported to the summary stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryTag {
    /// Logical collaborator, e.g. `mongo`, `kafka`, `client`.
    pub node: String,
    pub command: String,
    pub code: String,
    pub description: String,
    pub response_time_micros: u64,
}

impl SummaryTag {
    pub fn new(
        node: impl Into<String>,
        command: impl Into<String>,
        code: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            command: command.into(),
            code: code.into(),
            description: description.into(),
            response_time_micros: 0,
        }
    }

    pub fn with_response_time(mut self, micros: u64) -> Self {
        self.response_time_micros = micros;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceResult {
    pub result_code: String,
    pub result_desc: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub res_time: u64,
}

impl From<&SummaryTag> for SequenceResult {
    fn from(tag: &SummaryTag) -> Self {
        Self {
            result_code: tag.code.clone(),
            result_desc: tag.description.clone(),
            res_time: tag.response_time_micros,
        }
    }
}

/// All results recorded for one `(node, command)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub node: String,
    pub command: String,
    pub result: Vec<SequenceResult>,
}

/// Rendered form of a [`Sequence`] inside the summary message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub event: String,
    pub result: Vec<SequenceResult>,
}

impl From<Sequence> for EventSummary {
    fn from(seq: Sequence) -> Self {
        Self {
            event: format!("{}.{}", seq.node, seq.command),
            result: seq.result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_optional_fields_are_omitted() {
        let record = LogRecord {
            service_name: "order-service".into(),
            transaction_id: "tx-1".into(),
            ..Default::default()
        };
        let json: Value = serde_json::to_value(&record).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(obj["logType"], "detail");
        assert_eq!(obj["serviceName"], "order-service");
        assert_eq!(obj["transactionId"], "tx-1");
        assert!(!obj.contains_key("metadata"));
        assert!(!obj.contains_key("subAction"));
        assert!(!obj.contains_key("responseTime"));
        assert!(!obj.contains_key("timestamp"));
    }

    #[test]
    fn round_trip_keeps_populated_fields() {
        let record = LogRecord {
            log_type: LogType::Summary,
            service_name: "user-service".into(),
            component_version: "1.2.0".into(),
            metadata: Metadata {
                client_ip: Some("10.0.0.7".into()),
                method: Some("POST".into()),
                ..Default::default()
            },
            response_time: 1520,
            app_result_code: "20000".into(),
            timestamp: Some(Utc::now()),
            ..Default::default()
        };

        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("\"clientIP\":\"10.0.0.7\""));
        let parsed: LogRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn extra_context_fields_use_wire_names() {
        let mut record = LogRecord {
            host: "https://api.example.com".into(),
            tags: vec!["checkout".into()],
            metadata: Metadata {
                message_value: Some(r#"{"orderId":"o-1"}"#.into()),
                ..Default::default()
            },
            ..Default::default()
        };
        record.custom_fields.insert("tenant".into(), json!("acme"));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["host"], "https://api.example.com");
        assert_eq!(json["tags"], json!(["checkout"]));
        assert_eq!(json["customFields"]["tenant"], "acme");
        assert_eq!(json["metadata"]["messageValue"], r#"{"orderId":"o-1"}"#);

        let bare = serde_json::to_value(LogRecord::default()).unwrap();
        assert!(bare.get("tags").is_none());
        assert!(bare.get("customFields").is_none());
        assert!(bare.get("host").is_none());
    }

    #[test]
    fn set_updates_named_field() {
        let mut record = LogRecord::default();
        record.set(RecordField::AppResultCode, "40400");
        record.set(RecordField::UseCase, "create-order");
        assert_eq!(record.app_result_code, "40400");
        assert_eq!(record.use_case, "create-order");
    }

    #[test]
    fn sequence_renders_as_dotted_event() {
        let seq = Sequence {
            node: "mongo".into(),
            command: "insert_order".into(),
            result: vec![SequenceResult {
                result_code: "200".into(),
                result_desc: "ok".into(),
                res_time: 0,
            }],
        };
        let event = EventSummary::from(seq);
        assert_eq!(event.event, "mongo.insert_order");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"mongo.insert_order","result":[{"result_code":"200","result_desc":"ok"}]}"#
        );
    }
}
