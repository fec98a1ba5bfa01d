//! dockmon.toml configuration parser.
//!
//! ```toml
//! [timeouts]
//! http = "1s"
//! docker = "10s"
//!
//! [[services]]
//! service_name = "api"
//! liveness_url = "http://api:8080/health"
//! liveness_interval = "10s"
//! restart = true
//! fail_after = 3
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};
use crate::target::TargetDefinition;

/// Default timeout for a single liveness request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(1);

/// Default stop timeout passed to the container runtime on restart.
pub const DEFAULT_DOCKER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    pub http: Option<DurationValue>,
    pub docker: Option<DurationValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    pub liveness_url: String,
    pub liveness_interval: DurationValue,
    #[serde(default)]
    pub restart: bool,
    pub fail_after: u32,
}

/// A duration given either as whole seconds or as a string like "500ms".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    fn resolve(&self, field: &str) -> ConfigResult<Duration> {
        let duration = match self {
            DurationValue::Seconds(secs) => Duration::from_secs(*secs),
            DurationValue::Text(text) => {
                parse_duration(text).ok_or_else(|| ConfigError::InvalidDuration {
                    field: field.to_string(),
                    value: text.clone(),
                })?
            }
        };
        if duration.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: field.to_string(),
            });
        }
        Ok(duration)
    }
}

impl MonitorConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate every service entry and build the target definitions, in
    /// file order.
    pub fn targets(&self) -> ConfigResult<Vec<TargetDefinition>> {
        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(self.services.len());
        for svc in &self.services {
            let field = format!("liveness_interval of {}", svc.service_name);
            let target = TargetDefinition::new(
                svc.service_name.trim(),
                svc.liveness_url.trim(),
                svc.liveness_interval.resolve(&field)?,
                svc.restart,
                svc.fail_after,
            )?;
            if !seen.insert(target.service_name().to_string()) {
                return Err(ConfigError::DuplicateService(target.service_name().to_string()));
            }
            targets.push(target);
        }
        Ok(targets)
    }

    /// Timeout for one liveness request.
    pub fn http_timeout(&self) -> ConfigResult<Duration> {
        match &self.timeouts.http {
            Some(value) => value.resolve("timeouts.http"),
            None => Ok(DEFAULT_HTTP_TIMEOUT),
        }
    }

    /// Stop timeout handed to the container runtime on restart.
    pub fn docker_timeout(&self) -> ConfigResult<Duration> {
        match &self.timeouts.docker {
            Some(value) => value.resolve("timeouts.docker"),
            None => Ok(DEFAULT_DOCKER_TIMEOUT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[timeouts]
http = "2s"

[[services]]
service_name = "web"
liveness_url = "http://web:8080/health"
liveness_interval = "15s"
restart = true
fail_after = 3

[[services]]
service_name = "api"
liveness_url = "http://api:9000/healthz"
liveness_interval = 30
fail_after = 5
"#;

    #[test]
    fn parses_services_in_file_order() {
        let config = MonitorConfig::from_toml_str(SAMPLE).unwrap();
        let targets = config.targets().unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].service_name(), "web");
        assert_eq!(targets[0].liveness_interval(), Duration::from_secs(15));
        assert!(targets[0].restart_enabled());
        assert_eq!(targets[1].service_name(), "api");
        assert_eq!(targets[1].liveness_interval(), Duration::from_secs(30));
        assert!(!targets[1].restart_enabled());
        assert_eq!(targets[1].fail_after(), 5);
    }

    #[test]
    fn timeouts_fall_back_to_defaults() {
        let config = MonitorConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.http_timeout().unwrap(), Duration::from_secs(2));
        assert_eq!(config.docker_timeout().unwrap(), DEFAULT_DOCKER_TIMEOUT);
    }

    #[test]
    fn empty_config_has_no_services() {
        let config = MonitorConfig::from_toml_str("").unwrap();
        assert!(matches!(config.targets(), Err(ConfigError::NoServices)));
    }

    #[test]
    fn duplicate_service_names_rejected() {
        let toml_str = r#"
[[services]]
service_name = "api"
liveness_url = "http://a/health"
liveness_interval = 5
fail_after = 1

[[services]]
service_name = "api"
liveness_url = "http://b/health"
liveness_interval = 5
fail_after = 1
"#;
        let config = MonitorConfig::from_toml_str(toml_str).unwrap();
        assert!(matches!(config.targets(), Err(ConfigError::DuplicateService(name)) if name == "api"));
    }

    #[test]
    fn zero_interval_rejected() {
        let toml_str = r#"
[[services]]
service_name = "api"
liveness_url = "http://a/health"
liveness_interval = 0
fail_after = 1
"#;
        let config = MonitorConfig::from_toml_str(toml_str).unwrap();
        assert!(matches!(config.targets(), Err(ConfigError::ZeroDuration { .. })));
    }

    #[test]
    fn unparseable_interval_rejected() {
        let toml_str = r#"
[[services]]
service_name = "api"
liveness_url = "http://a/health"
liveness_interval = "every so often"
fail_after = 1
"#;
        let config = MonitorConfig::from_toml_str(toml_str).unwrap();
        assert!(matches!(config.targets(), Err(ConfigError::InvalidDuration { .. })));
    }

    #[test]
    fn missing_required_field_is_parse_error() {
        let toml_str = r#"
[[services]]
service_name = "api"
liveness_interval = 5
fail_after = 1
"#;
        assert!(matches!(
            MonitorConfig::from_toml_str(toml_str),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dockmon.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = MonitorConfig::from_file(&path).unwrap();
        assert_eq!(config.services.len(), 2);

        let missing = MonitorConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
