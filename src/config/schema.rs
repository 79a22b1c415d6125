//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::observability::db_trace::DbLogLevel;

/// Root configuration for the users service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Database connection parameters.
    pub database: DatabaseConfig,

    /// HTTP surface settings.
    pub http: HttpConfig,

    /// Startup and shutdown behaviour.
    pub lifecycle: LifecycleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// PostgreSQL connection parameters.
///
/// Usually supplied through the `POSTGRES_*` environment variables, see
/// [`ServiceConfig::apply_env`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub dbname: String,

    /// Upper bound on pooled connections.
    pub max_connections: u32,

    /// Time allowed to acquire a pooled connection, in seconds.
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: String::new(),
            host: "localhost".to_string(),
            port: 5432,
            dbname: "postgres".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

impl DatabaseConfig {
    /// Build sqlx connect options. TLS is disabled and the session time zone
    /// pinned to UTC.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .username(&self.user)
            .password(&self.password)
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname)
            .ssl_mode(PgSslMode::Disable)
            .options([("timezone", "UTC")])
    }
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Common prefix for every route (e.g., "/api").
    pub path_prefix: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,

    /// Return raw storage error text in 500 bodies.
    /// When false a generic message is sent instead.
    pub expose_error_details: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            path_prefix: "/api".to_string(),
            request_timeout_secs: 30,
            max_body_size: 1024 * 1024, // 1MB
            expose_error_details: true,
        }
    }
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long in-flight requests may run after a termination signal.
    pub shutdown_grace_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (trace, debug, info, warn, error or an
    /// `EnvFilter` expression).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Minimum severity for database query traces.
    pub db_log_level: DbLogLevel,

    /// Successful queries slower than this are logged as warnings.
    /// Zero disables slow-query detection.
    pub slow_query_threshold_ms: u64,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint path, relative to the HTTP prefix.
    pub metrics_path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            db_log_level: DbLogLevel::Warn,
            slow_query_threshold_ms: 100,
            metrics_enabled: true,
            metrics_path: "/metrics".to_string(),
        }
    }
}
