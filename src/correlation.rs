//! Correlation ids and request origin for a new scope.

use crate::record::Metadata;
use uuid::Uuid;

pub const TRANSACTION_ID_HEADER: &str = "x-transaction-id";
pub const SESSION_ID_HEADER: &str = "x-session-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const TRACEPARENT_HEADER: &str = "traceparent";

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";
const USER_AGENT_HEADER: &str = "user-agent";
const REFERER_HEADER: &str = "referer";
const HOST_HEADER: &str = "host";

/// Ids supplied by the caller. Missing transaction, session and request
/// ids are generated when the scope is created; trace and span ids are
/// carried through as opaque strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correlation {
    pub transaction_id: Option<String>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
}

impl Correlation {
    /// Extract ids from HTTP or message headers. Header names are matched
    /// case-insensitively; values that are not UTF-8 or are blank are
    /// ignored.
    pub fn from_headers<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let mut c = Correlation::default();
        for (name, value) in headers {
            let Ok(value) = std::str::from_utf8(value.as_ref()) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let name = name.as_ref();
            if name.eq_ignore_ascii_case(TRANSACTION_ID_HEADER) {
                c.transaction_id = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(SESSION_ID_HEADER) {
                c.session_id = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(REQUEST_ID_HEADER) {
                c.request_id = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(TRACEPARENT_HEADER) {
                if let Some((trace, span)) = parse_traceparent(value) {
                    c.trace_id = Some(trace);
                    c.span_id = Some(span);
                }
            }
        }
        c
    }

    pub fn with_trace(mut self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self.span_id = Some(span_id.into());
        self
    }

    /// Fill absent transaction, session and request ids with fresh UUIDs.
    pub(crate) fn resolve(self) -> ResolvedIds {
        ResolvedIds {
            transaction_id: self.transaction_id.unwrap_or_else(new_id),
            session_id: self.session_id.unwrap_or_else(new_id),
            request_id: self.request_id.unwrap_or_else(new_id),
            trace_id: self.trace_id.unwrap_or_default(),
            span_id: self.span_id.unwrap_or_default(),
        }
    }
}

pub(crate) struct ResolvedIds {
    pub transaction_id: String,
    pub session_id: String,
    pub request_id: String,
    pub trace_id: String,
    pub span_id: String,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parse a W3C `traceparent` value: `version-traceid-spanid-flags`.
fn parse_traceparent(value: &str) -> Option<(String, String)> {
    let mut parts = value.split('-');
    let _version = parts.next()?;
    let trace = parts.next()?;
    let span = parts.next()?;
    let _flags = parts.next()?;
    let valid = |s: &str, len: usize| {
        s.len() == len && s.bytes().all(|b| b.is_ascii_hexdigit()) && s.bytes().any(|b| b != b'0')
    };
    if !valid(trace, 32) || !valid(span, 16) {
        return None;
    }
    Some((trace.to_ascii_lowercase(), span.to_ascii_lowercase()))
}

/// Where the unit of work came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Http {
        client_ip: Option<String>,
        user_agent: Option<String>,
        referer: Option<String>,
        method: String,
        url: String,
        /// `proto://host` the request was addressed to.
        host: Option<String>,
    },
    Message {
        /// Broker host the message was consumed from.
        broker: String,
        topic: String,
        key: Option<String>,
        consumer_group: Option<String>,
        value: Option<String>,
    },
}

impl Origin {
    pub fn http(method: impl Into<String>, url: impl Into<String>) -> Self {
        Origin::Http {
            client_ip: None,
            user_agent: None,
            referer: None,
            method: method.into(),
            url: url.into(),
            host: None,
        }
    }

    /// HTTP origin with client details taken from request headers.
    ///
    /// The client IP is the first `X-Forwarded-For` entry; without one, use
    /// [`Origin::with_remote_addr`]. `Host` and `X-Forwarded-Proto` form the
    /// host, defaulting to `http`.
    pub fn http_from_headers<I, K, V>(method: impl Into<String>, url: impl Into<String>, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let mut client_ip = None;
        let mut user_agent = None;
        let mut referer = None;
        let mut host = None;
        let mut proto = None;
        for (name, value) in headers {
            let Ok(value) = std::str::from_utf8(value.as_ref()) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let name = name.as_ref();
            if name.eq_ignore_ascii_case(FORWARDED_FOR_HEADER) {
                client_ip = value
                    .split(',')
                    .next()
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
                    .map(str::to_string);
            } else if name.eq_ignore_ascii_case(USER_AGENT_HEADER) {
                user_agent = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(REFERER_HEADER) {
                referer = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(HOST_HEADER) {
                host = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(FORWARDED_PROTO_HEADER) {
                proto = Some(value.to_string());
            }
        }

        Origin::Http {
            client_ip,
            user_agent,
            referer,
            method: method.into(),
            url: url.into(),
            host: host.map(|h| format!("{}://{}", proto.as_deref().unwrap_or("http"), h)),
        }
    }

    pub fn message(broker: impl Into<String>, topic: impl Into<String>) -> Self {
        Origin::Message {
            broker: broker.into(),
            topic: topic.into(),
            key: None,
            consumer_group: None,
            value: None,
        }
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        if let Origin::Http { client_ip, .. } = &mut self {
            *client_ip = Some(ip.into());
        }
        self
    }

    /// Socket peer address, used as client IP when no forwarded header set
    /// one. The port is stripped.
    pub fn with_remote_addr(mut self, addr: &str) -> Self {
        if let Origin::Http { client_ip: slot @ None, .. } = &mut self {
            let peer = addr.rsplit_once(':').map(|(host, _)| host).unwrap_or(addr);
            if !peer.is_empty() {
                *slot = Some(peer.to_string());
            }
        }
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        if let Origin::Http { user_agent, .. } = &mut self {
            *user_agent = Some(agent.into());
        }
        self
    }

    pub fn with_referer(mut self, value: impl Into<String>) -> Self {
        if let Origin::Http { referer, .. } = &mut self {
            *referer = Some(value.into());
        }
        self
    }

    pub fn with_key(mut self, value: impl Into<String>) -> Self {
        if let Origin::Message { key, .. } = &mut self {
            *key = Some(value.into());
        }
        self
    }

    pub fn with_consumer_group(mut self, group: impl Into<String>) -> Self {
        if let Origin::Message { consumer_group, .. } = &mut self {
            *consumer_group = Some(group.into());
        }
        self
    }

    /// Raw message payload, logged as `metadata.messageValue`.
    pub fn with_value(mut self, payload: impl Into<String>) -> Self {
        if let Origin::Message { value, .. } = &mut self {
            *value = Some(payload.into());
        }
        self
    }

    /// Value of the record's `host` field.
    pub(crate) fn host(&self) -> String {
        match self {
            Origin::Http { host, .. } => host.clone().unwrap_or_default(),
            Origin::Message { broker, .. } => broker.clone(),
        }
    }

    pub(crate) fn metadata(&self, trace_id: &str, span_id: &str) -> Metadata {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        let mut meta = Metadata {
            trace_id: opt(trace_id),
            span_id: opt(span_id),
            ..Default::default()
        };
        match self {
            Origin::Http {
                client_ip,
                user_agent,
                referer,
                method,
                url,
                host: _,
            } => {
                meta.client_ip = client_ip.clone();
                meta.user_agent = user_agent.clone();
                meta.referer = referer.clone();
                meta.method = Some(method.clone());
                meta.url = Some(url.clone());
                meta.source = Some("api".to_string());
                meta.broker = Some("none".to_string());
            }
            Origin::Message {
                broker,
                topic,
                key,
                consumer_group,
                value,
            } => {
                meta.broker = Some(broker.clone());
                meta.topic = Some(topic.clone());
                meta.key = key.clone();
                meta.consumer_group = consumer_group.clone();
                meta.message_value = value.clone();
                meta.source = Some("event-source".to_string());
            }
        }
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_matched_case_insensitively() {
        let headers = vec![
            ("X-Transaction-ID", "tx-123".as_bytes()),
            ("x-session-id", b"sess-9".as_slice()),
            ("Content-Type", b"application/json".as_slice()),
        ];
        let c = Correlation::from_headers(headers);
        assert_eq!(c.transaction_id.as_deref(), Some("tx-123"));
        assert_eq!(c.session_id.as_deref(), Some("sess-9"));
        assert_eq!(c.request_id, None);
    }

    #[test]
    fn blank_and_binary_values_are_ignored() {
        let headers: Vec<(String, Vec<u8>)> = vec![
            ("x-request-id".into(), b"   ".to_vec()),
            ("x-session-id".into(), vec![0xff, 0xfe]),
        ];
        let c = Correlation::from_headers(headers);
        assert_eq!(c, Correlation::default());
    }

    #[test]
    fn traceparent_yields_trace_and_span() {
        let c = Correlation::from_headers([(
            "traceparent",
            "00-4BF92F3577B34DA6A3CE929D0E0E4736-00f067aa0ba902b7-01",
        )]);
        assert_eq!(c.trace_id.as_deref(), Some("4bf92f3577b34da6a3ce929d0e0e4736"));
        assert_eq!(c.span_id.as_deref(), Some("00f067aa0ba902b7"));

        let bad = Correlation::from_headers([("traceparent", "00-0000-11-01")]);
        assert_eq!(bad.trace_id, None);
        let zero = Correlation::from_headers([(
            "traceparent",
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
        )]);
        assert_eq!(zero.trace_id, None);
    }

    #[test]
    fn resolve_generates_missing_ids() {
        let ids = Correlation {
            transaction_id: Some("tx-1".into()),
            ..Default::default()
        }
        .resolve();
        assert_eq!(ids.transaction_id, "tx-1");
        assert_eq!(ids.session_id.len(), 36);
        assert_ne!(ids.session_id, ids.request_id);
        assert!(ids.trace_id.is_empty());
    }

    #[test]
    fn origin_sets_source_tags() {
        let http = Origin::http("POST", "/orders").metadata("t", "s");
        assert_eq!(http.source.as_deref(), Some("api"));
        assert_eq!(http.broker.as_deref(), Some("none"));
        assert_eq!(http.trace_id.as_deref(), Some("t"));

        let msg = Origin::message("kafka-1:9092", "order.created").metadata("", "");
        assert_eq!(msg.source.as_deref(), Some("event-source"));
        assert_eq!(msg.topic.as_deref(), Some("order.created"));
        assert_eq!(msg.trace_id, None);
    }

    #[test]
    fn http_origin_reads_client_headers() {
        let headers = [
            ("User-Agent", "curl/8.4.0"),
            ("Referer", "https://shop.example.com/cart"),
            ("X-Forwarded-For", "203.0.113.9, 10.0.0.1"),
            ("Host", "api.example.com"),
            ("X-Forwarded-Proto", "https"),
        ];
        let origin = Origin::http_from_headers("POST", "/v1/users", headers).with_remote_addr("10.0.0.1:443");
        let meta = origin.metadata("", "");

        assert_eq!(meta.user_agent.as_deref(), Some("curl/8.4.0"));
        assert_eq!(meta.referer.as_deref(), Some("https://shop.example.com/cart"));
        assert_eq!(meta.client_ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(meta.method.as_deref(), Some("POST"));
        assert_eq!(origin.host(), "https://api.example.com");
    }

    #[test]
    fn remote_addr_is_fallback_without_port() {
        let origin = Origin::http_from_headers("GET", "/", [("host", "svc:8080")]).with_remote_addr("192.168.1.20:51234");
        assert_eq!(origin.metadata("", "").client_ip.as_deref(), Some("192.168.1.20"));
        assert_eq!(origin.host(), "http://svc:8080");

        let explicit = Origin::http("GET", "/")
            .with_client_ip("198.51.100.4")
            .with_user_agent("mobile-app/3.2")
            .with_referer("https://a.example");
        let meta = explicit.metadata("", "");
        assert_eq!(meta.client_ip.as_deref(), Some("198.51.100.4"));
        assert_eq!(meta.user_agent.as_deref(), Some("mobile-app/3.2"));
        assert_eq!(meta.referer.as_deref(), Some("https://a.example"));
    }

    #[test]
    fn message_origin_carries_payload_and_broker_host() {
        let origin = Origin::message("broker-1:9092", "order.created")
            .with_key("o-1")
            .with_consumer_group("billing")
            .with_value(r#"{"orderId":"o-1"}"#)
            .with_user_agent("ignored");
        let meta = origin.metadata("", "");
        assert_eq!(meta.key.as_deref(), Some("o-1"));
        assert_eq!(meta.consumer_group.as_deref(), Some("billing"));
        assert_eq!(meta.message_value.as_deref(), Some(r#"{"orderId":"o-1"}"#));
        assert_eq!(meta.user_agent, None);
        assert_eq!(origin.host(), "broker-1:9092");
    }
}
