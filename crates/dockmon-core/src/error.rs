//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating target definitions.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no services configured")]
    NoServices,

    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("duplicate service name: {0}")]
    DuplicateService(String),

    #[error("invalid liveness url for {service}: {url}")]
    InvalidUrl { service: String, url: String },

    #[error("invalid duration for {field}: {value}")]
    InvalidDuration { field: String, value: String },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: String },

    #[error("fail_after for {0} must be at least 1")]
    ZeroFailAfter(String),
}
