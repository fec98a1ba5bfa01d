//! dockmon-api — REST API for dockmon.
//!
//! Read-only queries over the status records written by the health engine.
//! Everything under `/api` sits behind HTTP basic authentication.
//!
//! # API Routes
//!
//! | Method | Path | Auth | Description |
//! |---|---|---|---|
//! | GET | `/health` | no | Liveness of the API itself |
//! | POST | `/api/login` | yes | Verify credentials |
//! | GET | `/api/status?serviceName=` | yes | One service's status |
//! | GET | `/api/statuses` | yes | All statuses, ordered by name |
//! | GET | `/api/events?serviceName=&limit=` | yes | Recent health transitions and restarts |

pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tracing::warn;

use dockmon_state::StatusRepository;

pub use middleware::Credentials;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn StatusRepository>,
    /// `None` disables authentication.
    pub credentials: Option<Credentials>,
}

/// Build the complete API router.
pub fn build_router(store: Arc<dyn StatusRepository>, credentials: Option<Credentials>) -> Router {
    if credentials.is_none() {
        warn!("API authentication is disabled (--no-auth)");
    }
    let state = ApiState { store, credentials };

    let api_routes = Router::new()
        .route("/login", post(handlers::login))
        .route("/status", get(handlers::get_status))
        .route("/statuses", get(handlers::list_statuses))
        .route("/events", get(handlers::list_events))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_basic_auth,
        ))
        .with_state(state);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        .layer(axum::middleware::from_fn(middleware::log_requests))
}
