use crate::action::LogAction;
use crate::masking::{Masker, MaskingRule};
use crate::record::LogRecord;
use crate::sink::{Channel, Level, LineSink};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Writes detail lines for one scope.
///
/// Owns the scope's [`LogRecord`]. Every emission overwrites the action
/// fields, writes one JSON line and then clears `metadata` and
/// `subAction`. Nothing here returns an error: serialization problems are
/// turned into an `{"error": ..}` message and the line is still written.
pub struct DetailLogger {
    record: LogRecord,
    sink: Arc<dyn LineSink>,
    masker: Arc<Masker>,
}

impl DetailLogger {
    pub fn new(record: LogRecord, sink: Arc<dyn LineSink>, masker: Arc<Masker>) -> Self {
        Self {
            record,
            sink,
            masker,
        }
    }

    pub fn record(&self) -> &LogRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut LogRecord {
        &mut self.record
    }

    pub fn emit<T: Serialize + ?Sized>(
        &mut self,
        level: Level,
        action: &LogAction,
        data: &T,
        rules: &[MaskingRule],
    ) {
        let payload = match serde_json::to_value(data) {
            Ok(v) => v,
            Err(e) => json!({ "error": e.to_string() }),
        };
        let masked = self.masker.mask(&payload, rules);

        self.record.action = action.kind.as_str().to_string();
        self.record.action_description = action.description.clone();
        self.record.sub_action = action.sub_action.clone();
        self.record.level = level.as_str().to_string();
        self.record.timestamp = Some(Utc::now());
        self.record.message = render_message(&masked);

        let line = serde_json::to_string(&self.record)
            .unwrap_or_else(|e| json!({ "error": e.to_string() }).to_string());
        self.sink.write_line(Channel::Detail, level, &line);

        self.record.metadata = Default::default();
        self.record.sub_action.clear();
    }
}

/// Strings are logged verbatim, scalars as lowercase text, null as nothing
/// and everything else as compact JSON.
fn render_message(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string().to_lowercase(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masking::{MaskingKey, MaskingType};
    use crate::memory_sink::MemorySink;
    use crate::record::Metadata;
    use serde::ser::Error as _;
    use std::collections::BTreeMap;

    fn logger(sink: &MemorySink) -> DetailLogger {
        let record = LogRecord {
            service_name: "product-service".into(),
            transaction_id: "tx-1".into(),
            metadata: Metadata {
                method: Some("GET".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        DetailLogger::new(
            record,
            Arc::new(sink.clone()),
            Arc::new(Masker::new(MaskingKey::none())),
        )
    }

    fn parse(line: &str) -> Value {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn emits_masked_single_line() {
        let sink = MemorySink::new();
        let mut log = logger(&sink);
        let body = json!({"user": {"phone": "0812345678"}});
        log.emit(
            Level::Info,
            &LogAction::inbound("create user").with_sub_action("POST"),
            &body,
            &[MaskingRule::new("user.phone", MaskingType::Msisdn)],
        );

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].line.contains('\n'));
        let doc = parse(&lines[0].line);
        assert_eq!(doc["action"], "[INBOUND]");
        assert_eq!(doc["actionDescription"], "create user");
        assert_eq!(doc["subAction"], "POST");
        assert_eq!(doc["level"], "info");
        assert_eq!(doc["transactionId"], "tx-1");
        assert_eq!(doc["metadata"]["method"], "GET");
        let message = parse(doc["message"].as_str().unwrap());
        assert_eq!(message["user"]["phone"], "081XXX5678");
        assert_eq!(body["user"]["phone"], "0812345678");
    }

    #[test]
    fn transient_fields_reset_after_emit() {
        let sink = MemorySink::new();
        let mut log = logger(&sink);
        log.emit(Level::Info, &LogAction::inbound("a").with_sub_action("x"), "first", &[]);
        log.emit(Level::Error, &LogAction::exception("b"), "second", &[]);

        let lines = sink.lines();
        let second = parse(&lines[1].line);
        assert!(second.get("metadata").is_none());
        assert!(second.get("subAction").is_none());
        assert_eq!(second["actionDescription"], "b");
        assert_eq!(second["message"], "second");
        assert_eq!(second["transactionId"], "tx-1");
        assert_eq!(lines[1].level, Level::Error);
    }

    #[test]
    fn scalars_render_as_text() {
        assert_eq!(render_message(&json!(42)), "42");
        assert_eq!(render_message(&json!(true)), "true");
        assert_eq!(render_message(&Value::Null), "");
        assert_eq!(render_message(&json!([1, 2])), "[1,2]");
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("boom"))
        }
    }

    #[test]
    fn serialization_failure_still_writes_line() {
        let sink = MemorySink::new();
        let mut log = logger(&sink);
        log.emit(Level::Info, &LogAction::system("bad payload"), &Unserializable, &[]);

        let doc = parse(&sink.lines()[0].line);
        let message = parse(doc["message"].as_str().unwrap());
        assert_eq!(message["error"], "boom");
    }

    #[test]
    fn non_string_map_keys_are_reported() {
        let sink = MemorySink::new();
        let mut log = logger(&sink);
        let mut data = BTreeMap::new();
        data.insert(vec![1u8], "v");
        log.emit(Level::Debug, &LogAction::app_logic("keys"), &data, &[]);

        let doc = parse(&sink.lines()[0].line);
        assert!(doc["message"].as_str().unwrap().contains("error"));
        assert_eq!(doc["level"], "debug");
    }
}
