//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid environment variable {name}: {reason}")]
    Env { name: &'static str, reason: String },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub const ENV_USER: &str = "POSTGRES_USER";
pub const ENV_PASSWORD: &str = "POSTGRES_PASSWORD";
pub const ENV_HOST: &str = "POSTGRES_HOST";
pub const ENV_PORT: &str = "POSTGRES_PORT";
pub const ENV_DBNAME: &str = "POSTGRES_DBNAME";

impl ServiceConfig {
    /// Overlay database parameters from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay database parameters using `lookup` as the variable source.
    /// Unset variables leave the current value untouched.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db = &mut self.database;
        if let Some(user) = lookup(ENV_USER) {
            db.user = user;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            db.password = password;
        }
        if let Some(host) = lookup(ENV_HOST) {
            db.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            db.port = port.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Env {
                name: ENV_PORT,
                reason: e.to_string(),
            })?;
        }
        if let Some(dbname) = lookup(ENV_DBNAME) {
            db.dbname = dbname;
        }
        Ok(())
    }
}

/// Load and validate configuration from a TOML file, then apply the
/// environment overlay.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: ServiceConfig = toml::from_str(&content)?;
    config.apply_env()?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build the configuration without a file: defaults plus environment.
pub fn load_from_env() -> Result<ServiceConfig, ConfigError> {
    let mut config = ServiceConfig::default();
    config.apply_env()?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn env_overrides_database_section() {
        let mut config = ServiceConfig::default();
        config
            .apply_env_from(env(&[
                (ENV_USER, "svc"),
                (ENV_PASSWORD, "secret"),
                (ENV_HOST, "pg"),
                (ENV_PORT, "6543"),
                (ENV_DBNAME, "users"),
            ]))
            .unwrap();

        assert_eq!(config.database.user, "svc");
        assert_eq!(config.database.password, "secret");
        assert_eq!(config.database.host, "pg");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.dbname, "users");
    }

    #[test]
    fn unset_variables_keep_defaults() {
        let mut config = ServiceConfig::default();
        config.apply_env_from(env(&[(ENV_HOST, "pg")])).unwrap();
        assert_eq!(config.database.host, "pg");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.user, "postgres");
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_env_from(env(&[(ENV_PORT, "five")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { name: ENV_PORT, .. }));
    }

    #[test]
    fn load_config_reports_validation_errors() {
        let path = std::env::temp_dir().join(format!("users-service-{}.toml", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[http]\npath_prefix = \"api/\"\nrequest_timeout_secs = 0").unwrap();
        drop(file);

        let err = load_config(&path).unwrap_err();
        let _ = fs::remove_file(&path);

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/users-service.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
