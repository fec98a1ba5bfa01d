//! dockmon-state — durable service status for dockmon.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for one [`ServiceStatus`] record per monitored service plus a
//! chronological log of [`StatusEvent`]s.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! Status rows are keyed by service name, so a full table scan yields the
//! records ordered by name. Events are keyed `{service}:{timestamp}` which
//! makes per-service history a prefix range scan.
//!
//! Each health or restart update is a read-modify-write of a single row in
//! one write transaction, so independent monitoring loops can write their
//! own rows concurrently without any application-level locking.
//!
//! The health engine depends on the [`StatusRepository`] trait rather than
//! on [`StateStore`] directly.

pub mod error;
pub mod repository;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use repository::StatusRepository;
pub use store::StateStore;
pub use types::*;
