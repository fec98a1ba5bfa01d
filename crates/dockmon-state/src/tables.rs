//! redb table definitions for the dockmon state store.

use redb::TableDefinition;

/// Service status records keyed by `{service_name}`.
pub const STATUSES: TableDefinition<&str, &[u8]> = TableDefinition::new("service_statuses");

/// Status events keyed by `{service_name}:{unix_nanos}` (zero-padded).
pub const EVENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("status_events");
