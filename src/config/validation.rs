//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Validate path shapes used to build the router
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;
use crate::http::server::{HEALTHCHECK_PATH, USERS_PATH};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Whether `path` is, or falls under, one of the users API routes.
fn shadows_api_route(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    path == HEALTHCHECK_PATH || path == USERS_PATH || path.starts_with("/users/")
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.database.port == 0 {
        errors.push(ValidationError::new("database.port", "must be non-zero"));
    }
    if config.database.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be non-zero"));
    }

    let prefix = &config.http.path_prefix;
    if !prefix.is_empty() && (!prefix.starts_with('/') || prefix.ends_with('/')) {
        errors.push(ValidationError::new(
            "http.path_prefix",
            "must be empty or start with '/' and not end with '/'",
        ));
    }
    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::new("http.request_timeout_secs", "must be non-zero"));
    }
    if config.http.max_body_size == 0 {
        errors.push(ValidationError::new("http.max_body_size", "must be non-zero"));
    }

    if config.lifecycle.shutdown_grace_secs == 0 {
        errors.push(ValidationError::new("lifecycle.shutdown_grace_secs", "must be non-zero"));
    }

    let metrics_path = &config.observability.metrics_path;
    if config.observability.metrics_enabled {
        if !metrics_path.starts_with('/') {
            errors.push(ValidationError::new("observability.metrics_path", "must start with '/'"));
        } else if shadows_api_route(metrics_path) {
            errors.push(ValidationError::new(
                "observability.metrics_path",
                format!("'{metrics_path}' collides with an API route"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
