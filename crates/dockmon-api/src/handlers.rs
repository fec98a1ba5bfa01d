//! REST API handlers.
//!
//! Each handler reads via the `StatusRepository` and returns JSON wrapped in
//! the `{success, data, error}` envelope.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::error;

use crate::ApiState;

/// Events returned when no `limit` is given.
pub const DEFAULT_EVENT_LIMIT: usize = 50;
/// Upper bound on `limit`.
pub const MAX_EVENT_LIMIT: usize = 1000;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse + use<> {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn internal_error(e: impl std::fmt::Display) -> axum::response::Response {
    error!(error = %e, "status query failed");
    error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub service_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub service_name: Option<String>,
    pub limit: Option<usize>,
}

fn require_service_name(name: Option<String>) -> Result<String, axum::response::Response> {
    name.filter(|n| !n.is_empty()).ok_or_else(|| {
        error_response("no value found for key: serviceName", StatusCode::BAD_REQUEST).into_response()
    })
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "OK" }))
}

/// POST /api/login
///
/// Authentication happens in middleware; reaching the handler means the
/// credentials were accepted.
pub async fn login() -> impl IntoResponse {
    ApiResponse::ok("authenticated")
}

/// GET /api/status?serviceName=
pub async fn get_status(
    State(state): State<ApiState>,
    Query(query): Query<StatusQuery>,
) -> impl IntoResponse {
    let name = match require_service_name(query.service_name) {
        Ok(name) => name,
        Err(resp) => return resp,
    };
    match state.store.get_status(&name) {
        Ok(Some(status)) => ApiResponse::ok(status).into_response(),
        Ok(None) => error_response("service not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /api/statuses
pub async fn list_statuses(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_statuses() {
        Ok(statuses) => ApiResponse::ok(statuses).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /api/events?serviceName=&limit=
pub async fn list_events(
    State(state): State<ApiState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let name = match require_service_name(query.service_name) {
        Ok(name) => name,
        Err(resp) => return resp,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .min(MAX_EVENT_LIMIT);

    match state.store.get_status(&name) {
        Ok(Some(_)) => {}
        Ok(None) => return error_response("service not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => return internal_error(e),
    }
    match state.store.list_events(&name, limit) {
        Ok(events) => ApiResponse::ok(events).into_response(),
        Err(e) => internal_error(e),
    }
}
