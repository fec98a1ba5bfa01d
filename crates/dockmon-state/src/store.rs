//! StateStore — redb-backed service status persistence.
//!
//! Provides the create/update/query operations the monitoring engine and
//! the REST API need. The store supports both on-disk and in-memory
//! backends (the latter for the `memory` storage option and for testing).

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Events kept per service by default; older ones are pruned on insert.
pub const DEFAULT_EVENT_RETENTION: usize = 500;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
    event_retention: usize,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            event_retention: DEFAULT_EVENT_RETENTION,
        };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            event_retention: DEFAULT_EVENT_RETENTION,
        };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Keep at most `max` events per service (at least one).
    pub fn with_event_retention(mut self, max: usize) -> Self {
        self.event_retention = max.max(1);
        self
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(STATUSES).map_err(map_err!(Table))?;
        txn.open_table(EVENTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Statuses ───────────────────────────────────────────────────

    /// Insert a status record unless one already exists for the service.
    ///
    /// Returns true if the record was created. An existing record is left
    /// untouched, so repeated startups never duplicate or reset rows.
    pub fn insert_status_if_absent(&self, status: &ServiceStatus) -> StateResult<bool> {
        let key = status.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let created;
        {
            let mut table = txn.open_table(STATUSES).map_err(map_err!(Table))?;
            created = table.get(key).map_err(map_err!(Read))?.is_none();
            if created {
                let value = serde_json::to_vec(status).map_err(map_err!(Serialize))?;
                table
                    .insert(key, value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, created, "status record ensured");
        Ok(created)
    }

    /// Read-modify-write one status record in a single transaction.
    ///
    /// `apply` mutates the record and may return an event to append to the
    /// service's history in the same transaction.
    fn update_status<F>(&self, service_name: &str, at: DateTime<Utc>, apply: F) -> StateResult<ServiceStatus>
    where
        F: FnOnce(&mut ServiceStatus, DateTime<Utc>) -> Option<EventKind>,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let status;
        {
            let mut table = txn.open_table(STATUSES).map_err(map_err!(Table))?;
            let mut current: ServiceStatus = {
                let guard = table
                    .get(service_name)
                    .map_err(map_err!(Read))?
                    .ok_or_else(|| StateError::NotFound(service_name.to_string()))?;
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
            };

            let event = apply(&mut current, at);

            let value = serde_json::to_vec(&current).map_err(map_err!(Serialize))?;
            table
                .insert(service_name, value.as_slice())
                .map_err(map_err!(Write))?;

            if let Some(kind) = event {
                let event = StatusEvent {
                    service_name: service_name.to_string(),
                    kind,
                    at,
                };
                let value = serde_json::to_vec(&event).map_err(map_err!(Serialize))?;
                let mut events = txn.open_table(EVENTS).map_err(map_err!(Table))?;
                // Same-instant events get a suffix that still sorts after the first.
                let base = event.table_key();
                let mut key = base.clone();
                let mut bump = 0u32;
                while events.get(key.as_str()).map_err(map_err!(Read))?.is_some() {
                    bump += 1;
                    key = format!("{base}.{bump:04}");
                }
                events
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
                debug!(service = %service_name, ?kind, "status event recorded");

                let (start, end) = event_bounds(service_name);
                let keys = events
                    .range(start.as_str()..end.as_str())
                    .map_err(map_err!(Read))?
                    .map(|entry| entry.map(|(key, _)| key.value().to_string()))
                    .collect::<Result<Vec<String>, _>>()
                    .map_err(map_err!(Read))?;
                let owned: Vec<&String> =
                    keys.iter().filter(|k| is_event_key_of(k, &start)).collect();
                let excess = owned.len().saturating_sub(self.event_retention);
                for key in &owned[..excess] {
                    events.remove(key.as_str()).map_err(map_err!(Write))?;
                }
                if excess > 0 {
                    debug!(service = %service_name, pruned = excess, "old status events pruned");
                }
            }
            status = current;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(status)
    }

    /// Mark a service healthy and reset its failure streak.
    pub fn record_success(&self, service_name: &str, at: DateTime<Utc>) -> StateResult<ServiceStatus> {
        self.update_status(service_name, at, ServiceStatus::apply_success)
    }

    /// Mark a service unhealthy and extend its failure streak.
    pub fn record_failure(&self, service_name: &str, at: DateTime<Utc>) -> StateResult<ServiceStatus> {
        self.update_status(service_name, at, ServiceStatus::apply_failure)
    }

    /// Count a container restart and reset the failure streak.
    pub fn record_restart(&self, service_name: &str, at: DateTime<Utc>) -> StateResult<ServiceStatus> {
        self.update_status(service_name, at, ServiceStatus::apply_restart)
    }

    /// Get the status record of one service.
    pub fn get_status(&self, service_name: &str) -> StateResult<Option<ServiceStatus>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(STATUSES).map_err(map_err!(Table))?;
        match table.get(service_name).map_err(map_err!(Read))? {
            Some(guard) => {
                let status: ServiceStatus =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    /// List all status records, ordered by service name.
    pub fn list_statuses(&self) -> StateResult<Vec<ServiceStatus>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(STATUSES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let status: ServiceStatus =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(status);
        }
        Ok(results)
    }

    // ── Events ─────────────────────────────────────────────────────

    /// The most recent `limit` events of a service, oldest first.
    pub fn list_events(&self, service_name: &str, limit: usize) -> StateResult<Vec<StatusEvent>> {
        let (start, end) = event_bounds(service_name);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(EVENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table
            .range(start.as_str()..end.as_str())
            .map_err(map_err!(Read))?
            .rev()
        {
            if results.len() >= limit {
                break;
            }
            let (key, value) = entry.map_err(map_err!(Read))?;
            if !is_event_key_of(key.value(), &start) {
                continue;
            }
            let event: StatusEvent =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(event);
        }
        results.reverse();
        Ok(results)
    }
}

/// Key range holding every event whose key starts with `{service}:`.
fn event_bounds(service_name: &str) -> (String, String) {
    // ';' is the byte after ':'.
    (format!("{service_name}:"), format!("{service_name};"))
}

/// Whether `key` is an event of exactly the service owning `prefix`.
/// "api:v2:..." shares the "api:" prefix with "api" but has a non-numeric
/// tail.
fn is_event_key_of(key: &str, prefix: &str) -> bool {
    key.strip_prefix(prefix).is_some_and(|rest| {
        !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit() || b == b'.')
    })
}
