//! Environment variable names used by this crate for convenient
//! configuration from microservices.
//!
//! These are purely helpers; scopes, the masker and the sinks take explicit
//! values and never read the environment themselves.

/// Logical service name written to every record.
pub const SERVICE_NAME_ENV: &str = "SERVICE_NAME";

/// Service version, written as `componentVersion`.
pub const SERVICE_VERSION_ENV: &str = "SERVICE_VERSION";

/// Instance name; usually the pod or host name.
pub const HOSTNAME_ENV: &str = "HOSTNAME";

/// Deployment environment, e.g. `production`.
pub const APP_ENV_ENV: &str = "APP_ENV";

/// Optional component name, e.g. `API`.
pub const SERVICE_COMPONENT_ENV: &str = "SERVICE_COMPONENT";

/// Secret for hash masking.
pub const MASKING_HMAC_KEY_ENV: &str = "MASKING_HMAC_KEY";

/// Minimum level for stdout and files (`debug`, `info`, `warn`, `error`).
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Directory for rolling detail and summary files.
pub const LOG_DIR_ENV: &str = "LOG_DIR";

/// `true` to write detail and summary files.
pub const LOG_ENABLE_FILE_ENV: &str = "LOG_ENABLE_FILE";

/// `false` to silence stdout.
pub const LOG_ENABLE_STDOUT_ENV: &str = "LOG_ENABLE_STDOUT";

/// File rotation: `minutely`, `hourly`, `daily` or `never`.
pub const LOG_ROTATION_ENV: &str = "LOG_ROTATION";

/// Backend DSN for [`make_sink_from_config`](crate::backend::make_sink_from_config).
pub const LOG_SINK_DSN_ENV: &str = "LOG_SINK_DSN";

/// ClickHouse database name.
pub const LOG_SINK_CLICKHOUSE_DB_ENV: &str = "LOG_SINK_CLICKHOUSE_DB";

/// ClickHouse target table name.
pub const LOG_SINK_CLICKHOUSE_TABLE_ENV: &str = "LOG_SINK_CLICKHOUSE_TABLE";

/// Optional ClickHouse user name.
pub const LOG_SINK_CLICKHOUSE_USER_ENV: &str = "LOG_SINK_CLICKHOUSE_USER";

/// Optional ClickHouse password.
pub const LOG_SINK_CLICKHOUSE_PASSWORD_ENV: &str = "LOG_SINK_CLICKHOUSE_PASSWORD";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a boolean flag; accepts `1/0`, `true/false`, `yes/no`.
pub fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key).map(|v| v.trim().to_ascii_lowercase()) {
        Ok(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Ok(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
