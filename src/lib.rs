pub mod action;
pub mod correlation;
pub mod detail;
pub mod dispatch;
pub mod error;
pub mod masking;
pub mod record;
pub mod scope;
pub mod summary;

pub mod sink;
pub mod writer;

#[cfg(feature = "clickhouse")]
pub mod clickhouse;

pub mod backend;
pub mod env;
pub mod init;
pub mod memory_sink;
pub mod noop_sink;

pub use action::{DbOperation, EventKind, LogAction};
pub use correlation::{Correlation, Origin};
pub use error::ScopeError;
pub use masking::{Masker, MaskingKey, MaskingRule, MaskingType};
pub use record::{LogRecord, RecordField, SummaryTag};
pub use scope::{Scope, ScopeConfig};
pub use sink::{Channel, Level, LineSink, TracingSink};
pub use summary::FinalStatus;
