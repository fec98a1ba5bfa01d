//! Target definitions: the immutable description of one monitored service.

use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// One monitored service.
///
/// Built once at startup and never mutated. Construction validates every
/// field, so a `TargetDefinition` always has a non-empty name, an `http(s)://`
/// liveness URL, a non-zero interval and a restart threshold of at least one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDefinition {
    service_name: String,
    liveness_url: String,
    liveness_interval: Duration,
    restart_enabled: bool,
    fail_after: u32,
}

impl TargetDefinition {
    /// Create a validated target definition.
    pub fn new(
        service_name: impl Into<String>,
        liveness_url: impl Into<String>,
        liveness_interval: Duration,
        restart_enabled: bool,
        fail_after: u32,
    ) -> ConfigResult<Self> {
        let service_name = service_name.into();
        let liveness_url = liveness_url.into();

        if service_name.trim().is_empty() {
            return Err(ConfigError::EmptyServiceName);
        }
        if !is_http_url(&liveness_url) {
            return Err(ConfigError::InvalidUrl {
                service: service_name,
                url: liveness_url,
            });
        }
        // A zero interval turns the polling loop into a busy loop.
        if liveness_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: format!("liveness_interval of {service_name}"),
            });
        }
        if fail_after == 0 {
            return Err(ConfigError::ZeroFailAfter(service_name));
        }

        Ok(Self {
            service_name,
            liveness_url,
            liveness_interval,
            restart_enabled,
            fail_after,
        })
    }

    /// Unique service identifier, also the container name and persistence key.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Endpoint polled for health.
    pub fn liveness_url(&self) -> &str {
        &self.liveness_url
    }

    /// Time between two consecutive checks.
    pub fn liveness_interval(&self) -> Duration {
        self.liveness_interval
    }

    /// Whether the container may be restarted when the service is unhealthy.
    pub fn restart_enabled(&self) -> bool {
        self.restart_enabled
    }

    /// Consecutive failures required before a restart is attempted.
    pub fn fail_after(&self) -> u32 {
        self.fail_after
    }

    /// Whether `failures` consecutive failures warrant a restart.
    pub fn should_restart(&self, failures: u32) -> bool {
        self.restart_enabled && failures >= self.fail_after
    }
}

/// Accept absolute `http(s)://host[:port][/path]` URLs only.
fn is_http_url(url: &str) -> bool {
    let Some(rest) = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
    else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    !authority.is_empty() && !authority.starts_with(':') && !authority.contains(char::is_whitespace)
}
