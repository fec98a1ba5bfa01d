//! Container control error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors returned by the container runtime client.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("invalid docker host: {0}")]
    InvalidHost(String),

    #[error("invalid container name: {0:?}")]
    InvalidName(String),

    #[error("cannot connect to docker daemon at {0}")]
    Connect(String),

    #[error("docker request failed: {0}")]
    Request(String),

    #[error("docker request timed out after {0:?}")]
    Timeout(Duration),

    #[error("no such container: {0}")]
    NotFound(String),

    #[error("docker api returned {status}: {message}")]
    Api { status: u16, message: String },
}
