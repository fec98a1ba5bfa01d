//! Domain types for the dockmon state store.
//!
//! These types are the durable projection of the monitoring engine's
//! work. They serialize with camelCase field names, which is also the
//! JSON shape served by the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dockmon_core::TargetDefinition;

/// Sentinel for timestamps that have never been set.
pub const NEVER: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

// ── Service status ─────────────────────────────────────────────────

/// Health status and history of one monitored service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub service_name: String,
    pub liveness_url: String,
    /// Polling interval in milliseconds.
    pub liveness_interval_ms: u64,
    pub should_restart: bool,
    pub fail_after: u32,
    pub is_healthy: bool,
    pub restarts: u32,
    pub consecutive_failed_health_checks: u32,
    pub last_restarted: DateTime<Utc>,
    pub last_health_success: DateTime<Utc>,
    pub last_health_failure: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ServiceStatus {
    /// Fresh record for a target: healthy, no failures, no restarts.
    pub fn new(target: &TargetDefinition, created_at: DateTime<Utc>) -> Self {
        Self {
            service_name: target.service_name().to_string(),
            liveness_url: target.liveness_url().to_string(),
            liveness_interval_ms: u64::try_from(target.liveness_interval().as_millis())
                .unwrap_or(u64::MAX),
            should_restart: target.restart_enabled(),
            fail_after: target.fail_after(),
            is_healthy: true,
            restarts: 0,
            consecutive_failed_health_checks: 0,
            last_restarted: NEVER,
            last_health_success: NEVER,
            last_health_failure: NEVER,
            created_at,
        }
    }

    /// Key in the statuses table.
    pub fn table_key(&self) -> &str {
        &self.service_name
    }

    /// Apply a successful health check. Returns the event to log, if any.
    pub fn apply_success(&mut self, at: DateTime<Utc>) -> Option<EventKind> {
        let was_healthy = self.is_healthy;
        self.is_healthy = true;
        self.consecutive_failed_health_checks = 0;
        self.last_health_success = at;
        (!was_healthy).then_some(EventKind::Recovered)
    }

    /// Apply a failed health check. Returns the event to log, if any.
    pub fn apply_failure(&mut self, at: DateTime<Utc>) -> Option<EventKind> {
        let was_healthy = self.is_healthy;
        self.is_healthy = false;
        self.consecutive_failed_health_checks =
            self.consecutive_failed_health_checks.saturating_add(1);
        self.last_health_failure = at;
        was_healthy.then_some(EventKind::Unhealthy)
    }

    /// Apply a successful container restart.
    pub fn apply_restart(&mut self, at: DateTime<Utc>) -> Option<EventKind> {
        self.restarts = self.restarts.saturating_add(1);
        self.consecutive_failed_health_checks = 0;
        self.last_restarted = at;
        Some(EventKind::Restarted)
    }
}

// ── Events ─────────────────────────────────────────────────────────

/// A notable change in a service's health.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub service_name: String,
    pub kind: EventKind,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A healthy service failed a check.
    Unhealthy,
    /// An unhealthy service passed a check.
    Recovered,
    /// The service's container was restarted.
    Restarted,
}

impl StatusEvent {
    /// Build the composite key for the events table.
    pub fn table_key(&self) -> String {
        event_key(&self.service_name, self.at)
    }
}

/// `{service}:{nanos}` with nanos zero-padded so keys sort chronologically.
pub(crate) fn event_key(service_name: &str, at: DateTime<Utc>) -> String {
    let nanos = at.timestamp_nanos_opt().unwrap_or(0).max(0);
    format!("{service_name}:{nanos:020}")
}
