//! Request middleware: HTTP basic authentication and request logging.

use std::fmt;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::{Authorization, HeaderMapExt};
use tracing::{info, warn};

use crate::ApiState;
use crate::handlers::error_response;

/// Username and password accepted by the API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build credentials only when both parts are present and non-empty.
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (
            username.filter(|u| !u.is_empty()),
            password.filter(|p| !p.is_empty()),
        ) {
            (Some(username), Some(password)) => Some(Self { username, password }),
            _ => None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Reject requests whose basic-auth header does not match the configured
/// credentials. Passes everything through when none are configured.
pub async fn require_basic_auth(
    State(state): State<ApiState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.credentials.as_ref() else {
        return next.run(req).await;
    };

    let provided = req.headers().typed_get::<Authorization<Basic>>();
    if let Some(auth) = &provided {
        if expected.matches(auth.username(), auth.password()) {
            return next.run(req).await;
        }
    }

    let user = provided.as_ref().map_or("", |auth| auth.username());
    warn!(user, path = %req.uri().path(), "authentication failed");

    let mut resp =
        error_response("user could not be authenticated", StatusCode::UNAUTHORIZED).into_response();
    resp.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"dockmon\""),
    );
    resp
}

/// Log method, path, status and latency of every request.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let resp = next.run(req).await;

    info!(
        %method,
        %path,
        status = resp.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_needs_both_values() {
        assert!(Credentials::from_parts(None, None).is_none());
        assert!(Credentials::from_parts(Some("admin".into()), None).is_none());
        assert!(Credentials::from_parts(Some("".into()), Some("pw".into())).is_none());

        let creds = Credentials::from_parts(Some("admin".into()), Some("pw".into())).unwrap();
        assert_eq!(creds, Credentials::new("admin", "pw"));
        assert_eq!(creds.username(), "admin");
    }

    #[test]
    fn matches_is_exact() {
        let creds = Credentials::new("admin", "secret");
        assert!(creds.matches("admin", "secret"));
        assert!(!creds.matches("admin", "Secret"));
        assert!(!creds.matches("root", "secret"));
    }

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
