//! Per-request logging scope.
//!
//! A [`Scope`] is created when an HTTP request or a consumed message starts
//! being handled, collects detail lines and summary tags while the work
//! runs, and is finalized exactly once with [`Scope::end`].

use crate::action::LogAction;
use crate::correlation::{Correlation, Origin};
use crate::detail::DetailLogger;
use crate::env::{
    env_or, APP_ENV_ENV, HOSTNAME_ENV, SERVICE_COMPONENT_ENV, SERVICE_NAME_ENV,
    SERVICE_VERSION_ENV,
};
use crate::error::ScopeError;
use crate::masking::{Masker, MaskingRule};
use crate::record::{LogRecord, LogType, RecordField, SummaryTag};
use crate::sink::{Channel, Level, LineSink};
use crate::summary::{FinalStatus, SummaryAggregator};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Identity of the running service plus the shared collaborators every
/// scope needs. Built once at startup and cloned cheaply per request.
#[derive(Clone)]
pub struct ScopeConfig {
    pub service_name: String,
    pub service_version: String,
    pub instance: String,
    pub environment: String,
    pub component: String,
    pub sink: Arc<dyn LineSink>,
    pub masker: Arc<Masker>,
}

impl ScopeConfig {
    pub fn new(service_name: impl Into<String>, sink: Arc<dyn LineSink>, masker: Arc<Masker>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: String::new(),
            instance: String::new(),
            environment: String::new(),
            component: String::new(),
            sink,
            masker,
        }
    }

    /// Read the service identity from `SERVICE_NAME`, `SERVICE_VERSION`,
    /// `HOSTNAME`, `APP_ENV` and `SERVICE_COMPONENT`.
    pub fn from_env(sink: Arc<dyn LineSink>, masker: Arc<Masker>) -> Self {
        Self {
            service_name: env_or(SERVICE_NAME_ENV, "unknown-service"),
            service_version: env_or(SERVICE_VERSION_ENV, ""),
            instance: env_or(HOSTNAME_ENV, ""),
            environment: env_or(APP_ENV_ENV, ""),
            component: env_or(SERVICE_COMPONENT_ENV, ""),
            sink,
            masker,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }
}

/// Logging context of one request or consumed message.
///
/// Single-owner: handlers pass `&mut Scope` down through service and
/// repository calls. Different scopes may run concurrently; they only share
/// the sink.
pub struct Scope {
    detail: DetailLogger,
    summary: Option<SummaryAggregator>,
    sink: Arc<dyn LineSink>,
    started: Instant,
}

impl Scope {
    pub fn new(config: &ScopeConfig, correlation: Correlation, origin: Origin) -> Self {
        let ids = correlation.resolve();
        let record = LogRecord {
            log_type: LogType::Detail,
            service_name: config.service_name.clone(),
            component_version: config.service_version.clone(),
            instance: config.instance.clone(),
            environment: config.environment.clone(),
            component: config.component.clone(),
            metadata: origin.metadata(&ids.trace_id, &ids.span_id),
            host: origin.host(),
            transaction_id: ids.transaction_id,
            session_id: ids.session_id,
            request_id: ids.request_id,
            trace_id: ids.trace_id,
            span_id: ids.span_id,
            ..Default::default()
        };

        Self {
            detail: DetailLogger::new(record, Arc::clone(&config.sink), Arc::clone(&config.masker)),
            summary: Some(SummaryAggregator::new()),
            sink: Arc::clone(&config.sink),
            started: Instant::now(),
        }
    }

    pub fn record(&self) -> &LogRecord {
        self.detail.record()
    }

    pub fn transaction_id(&self) -> &str {
        &self.detail.record().transaction_id
    }

    pub fn is_finalized(&self) -> bool {
        self.summary.is_none()
    }

    pub fn info<T: Serialize + ?Sized>(&mut self, action: LogAction, data: &T, rules: &[MaskingRule]) {
        self.emit(Level::Info, action, data, rules);
    }

    pub fn debug<T: Serialize + ?Sized>(&mut self, action: LogAction, data: &T, rules: &[MaskingRule]) {
        self.emit(Level::Debug, action, data, rules);
    }

    pub fn error<T: Serialize + ?Sized>(&mut self, action: LogAction, data: &T, rules: &[MaskingRule]) {
        self.emit(Level::Error, action, data, rules);
    }

    fn emit<T: Serialize + ?Sized>(
        &mut self,
        level: Level,
        action: LogAction,
        data: &T,
        rules: &[MaskingRule],
    ) {
        if self.is_finalized() {
            tracing::warn!(
                transaction_id = %self.transaction_id(),
                action = %action.kind,
                "detail log after scope end dropped"
            );
            return;
        }
        self.detail.emit(level, &action, data, rules);
    }

    /// Register a downstream result for the summary line.
    ///
    /// A tag without a command takes the description of the last detail
    /// action. Tags with the same `(node, command)` share one sequence.
    pub fn set_summary(&mut self, mut tag: SummaryTag) -> &mut Self {
        if tag.command.is_empty() {
            tag.command = self.detail.record().action_description.clone();
        }
        if self.is_finalized() {
            tracing::warn!(
                transaction_id = %self.transaction_id(),
                node = %tag.node,
                "summary tag after scope end dropped"
            );
            return self;
        }
        if let Some(summary) = self.summary.as_mut() {
            summary.record(tag);
        }
        self
    }

    /// Set an aggregate field that the summary flush will use when the final
    /// status leaves it open.
    pub fn update(&mut self, field: RecordField, value: impl Into<String>) -> &mut Self {
        self.detail.record_mut().set(field, value);
        self
    }

    /// Attach a tag to every following detail line and the summary.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        let tag = tag.into();
        let tags = &mut self.detail.record_mut().tags;
        if !tags.contains(&tag) {
            tags.push(tag);
        }
        self
    }

    pub fn set_custom_field<T: Serialize + ?Sized>(&mut self, name: impl Into<String>, value: &T) -> &mut Self {
        let value = serde_json::to_value(value).unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }));
        self.detail.record_mut().custom_fields.insert(name.into(), value);
        self
    }

    /// Finalize with an HTTP status; see [`FinalStatus::from_http`].
    pub fn end(&mut self, http_status: u16, message: &str) -> Result<(), ScopeError> {
        self.end_with(FinalStatus::from_http(http_status, message))
    }

    /// Write the summary line and close the scope.
    ///
    /// Fails with [`ScopeError::AlreadyFinalized`] and writes nothing if the
    /// scope was already ended.
    pub fn end_with(&mut self, status: FinalStatus) -> Result<(), ScopeError> {
        let summary = self.summary.take().ok_or(ScopeError::AlreadyFinalized)?;
        let record = summary.flush(self.detail.record(), self.started, status);
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => serde_json::json!({ "error": e.to_string() }).to_string(),
        };
        self.sink.write_line(Channel::Summary, Level::Info, &line);
        Ok(())
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if !self.is_finalized() {
            tracing::warn!(
                transaction_id = %self.transaction_id(),
                "scope dropped without summary"
            );
        }
    }
}
