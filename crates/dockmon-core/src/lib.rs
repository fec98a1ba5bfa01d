//! dockmon-core — target definitions and configuration for dockmon.
//!
//! A [`TargetDefinition`] describes one monitored service: where its
//! liveness endpoint lives, how often to poll it, and whether (and when)
//! the backing container may be restarted. Definitions are loaded once at
//! startup from a TOML file and never change afterwards.

pub mod config;
pub mod duration;
pub mod error;
pub mod target;

pub use config::{MonitorConfig, ServiceConfig, TimeoutsConfig};
pub use duration::{format_duration, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use target::TargetDefinition;
