//! The persistence port consumed by the monitoring engine.

use chrono::{DateTime, Utc};

use dockmon_core::TargetDefinition;

use crate::error::StateResult;
use crate::store::StateStore;
use crate::types::{ServiceStatus, StatusEvent};

/// Durable record of service health, shared by every monitoring loop.
///
/// Implementations must accept concurrent calls from independent loops,
/// each touching only its own service's row. Every failure is returned to
/// the caller, which decides whether to log and continue.
pub trait StatusRepository: Send + Sync {
    /// Create the status record for a target unless it already exists.
    /// Returns true if a new record was written.
    fn create_if_absent(&self, target: &TargetDefinition) -> StateResult<bool>;

    fn record_success(&self, service_name: &str, at: DateTime<Utc>) -> StateResult<()>;

    fn record_failure(&self, service_name: &str, at: DateTime<Utc>) -> StateResult<()>;

    fn record_restart(&self, service_name: &str, at: DateTime<Utc>) -> StateResult<()>;

    fn get_status(&self, service_name: &str) -> StateResult<Option<ServiceStatus>>;

    /// All records, ordered by service name.
    fn list_statuses(&self) -> StateResult<Vec<ServiceStatus>>;

    /// The most recent `limit` events of one service, oldest first.
    fn list_events(&self, service_name: &str, limit: usize) -> StateResult<Vec<StatusEvent>>;
}

impl StatusRepository for StateStore {
    fn create_if_absent(&self, target: &TargetDefinition) -> StateResult<bool> {
        self.insert_status_if_absent(&ServiceStatus::new(target, Utc::now()))
    }

    fn record_success(&self, service_name: &str, at: DateTime<Utc>) -> StateResult<()> {
        StateStore::record_success(self, service_name, at).map(drop)
    }

    fn record_failure(&self, service_name: &str, at: DateTime<Utc>) -> StateResult<()> {
        StateStore::record_failure(self, service_name, at).map(drop)
    }

    fn record_restart(&self, service_name: &str, at: DateTime<Utc>) -> StateResult<()> {
        StateStore::record_restart(self, service_name, at).map(drop)
    }

    fn get_status(&self, service_name: &str) -> StateResult<Option<ServiceStatus>> {
        StateStore::get_status(self, service_name)
    }

    fn list_statuses(&self) -> StateResult<Vec<ServiceStatus>> {
        StateStore::list_statuses(self)
    }

    fn list_events(&self, service_name: &str, limit: usize) -> StateResult<Vec<StatusEvent>> {
        StateStore::list_events(self, service_name, limit)
    }
}
