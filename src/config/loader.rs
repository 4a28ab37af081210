//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a configuration from a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Resolve the effective configuration: optional file, then environment, then validation.
pub fn resolve_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => ServiceConfig::default(),
    };

    apply_env(&mut config, |key| std::env::var(key).ok()).map_err(ConfigError::Validation)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Unparsable values are reported instead of falling back to the default.
pub fn apply_env<F>(config: &mut ServiceConfig, lookup: F) -> Result<(), Vec<ValidationError>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    if let Some(host) = lookup("HOST") {
        config.listener.host = host;
    }
    if let Some(port) = lookup("PORT") {
        parse_into(&port, "listener.port", &mut config.listener.port, &mut errors);
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = lookup("LOG_FORMAT") {
        parse_into(&format, "logging.format", &mut config.logging.format, &mut errors);
    }
    if let Some(disabled) = lookup("OTEL_SDK_DISABLED") {
        let mut sdk_disabled = false;
        parse_into(&disabled, "tracing.enabled", &mut sdk_disabled, &mut errors);
        if sdk_disabled {
            config.tracing.enabled = false;
        }
    }
    if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.tracing.collector_endpoint = endpoint;
    }
    if let Some(name) = lookup("OTEL_SERVICE_NAME") {
        config.tracing.service_name = name;
    }
    if let Some(seed) = lookup("SEED_USERS") {
        parse_into(&seed, "users.seed", &mut config.users.seed, &mut errors);
    }

    config.tracing.collector_endpoint = normalize_endpoint(&config.tracing.collector_endpoint);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Strip a trailing signal path so `http://host:4318/v1/traces` and
/// `http://host:4318` name the same collector.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    trimmed
        .strip_suffix("/v1/traces")
        .unwrap_or(trimmed)
        .to_string()
}

fn parse_into<T>(raw: &str, field: &'static str, slot: &mut T, errors: &mut Vec<ValidationError>)
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(e) => errors.push(ValidationError::new(
            field,
            format!("cannot parse '{}': {}", raw, e),
        )),
    }
}
