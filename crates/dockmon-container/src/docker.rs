//! Docker Engine API client.
//!
//! Only the two endpoints dockmon needs are implemented:
//! `GET /_ping` (startup reachability check) and
//! `POST /containers/{name}/restart` (recovery).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::error::{ContainerError, ContainerResult};
use crate::{ContainerControl, RestartFuture};

/// Socket the Docker daemon listens on by default.
pub const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Extra time granted on top of the stop timeout for the daemon to
/// start the container again and answer.
const RESTART_GRACE: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "dockmon/0.1";

/// Where the Docker daemon is reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerHost {
    /// `unix:///var/run/docker.sock`
    Unix(PathBuf),
    /// `tcp://host:port`
    Tcp(String),
}

impl DockerHost {
    /// Parse a `DOCKER_HOST`-style address.
    pub fn parse(s: &str) -> ContainerResult<Self> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(ContainerError::InvalidHost(s.to_string()));
            }
            Ok(DockerHost::Unix(PathBuf::from(path)))
        } else if let Some(addr) = s.strip_prefix("tcp://").or_else(|| s.strip_prefix("http://")) {
            let addr = addr.trim_end_matches('/');
            if addr.is_empty() || addr.contains('/') {
                return Err(ContainerError::InvalidHost(s.to_string()));
            }
            Ok(DockerHost::Tcp(addr.to_string()))
        } else {
            Err(ContainerError::InvalidHost(s.to_string()))
        }
    }

    /// Read `DOCKER_HOST`, falling back to the default unix socket.
    pub fn from_env() -> ContainerResult<Self> {
        match std::env::var("DOCKER_HOST") {
            Ok(value) if !value.trim().is_empty() => Self::parse(&value),
            _ => Ok(Self::default()),
        }
    }

    /// Value for the `Host` header.
    fn authority(&self) -> &str {
        match self {
            DockerHost::Unix(_) => "localhost",
            DockerHost::Tcp(addr) => addr,
        }
    }
}

impl Default for DockerHost {
    fn default() -> Self {
        DockerHost::Unix(PathBuf::from(DEFAULT_DOCKER_SOCKET))
    }
}

impl fmt::Display for DockerHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockerHost::Unix(path) => write!(f, "unix://{}", path.display()),
            DockerHost::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// Error body returned by the Docker daemon.
#[derive(Deserialize)]
struct DockerErrorBody {
    message: String,
}

/// Minimal Docker Engine API client. Stateless: every request opens its
/// own connection, so one client can be shared by all monitoring loops.
#[derive(Debug, Clone)]
pub struct DockerClient {
    host: DockerHost,
}

impl DockerClient {
    pub fn new(host: DockerHost) -> Self {
        Self { host }
    }

    /// Client for the daemon named by `DOCKER_HOST`.
    pub fn from_env() -> ContainerResult<Self> {
        Ok(Self::new(DockerHost::from_env()?))
    }

    pub fn host(&self) -> &DockerHost {
        &self.host
    }

    /// Check that the daemon is reachable and answering.
    pub async fn ping(&self, timeout: Duration) -> ContainerResult<()> {
        let (status, body) = self.request(Method::GET, "/_ping", timeout).await?;
        if status == StatusCode::OK {
            debug!(host = %self.host, "docker daemon reachable");
            Ok(())
        } else {
            Err(api_error(status, &body))
        }
    }

    /// Restart a container, allowing it `stop_timeout` to exit cleanly.
    ///
    /// The whole call is bounded by `stop_timeout` plus a fixed grace.
    pub async fn restart_container(&self, name: &str, stop_timeout: Duration) -> ContainerResult<()> {
        let name = validate_container_name(name)?;
        let path = format!("/containers/{name}/restart?t={}", stop_seconds(stop_timeout));
        let deadline = stop_timeout.saturating_add(RESTART_GRACE);

        info!(container = %name, ?stop_timeout, "restarting container");
        let (status, body) = self.request(Method::POST, &path, deadline).await?;
        match status {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(ContainerError::NotFound(name.to_string())),
            _ => Err(api_error(status, &body)),
        }
    }

    /// Send one request and collect the full response, within `timeout`.
    async fn request(
        &self,
        method: Method,
        path: &str,
        timeout: Duration,
    ) -> ContainerResult<(StatusCode, Bytes)> {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("host", self.host.authority())
            .header("user-agent", USER_AGENT)
            .body(Empty::<Bytes>::new())
            .map_err(|e| ContainerError::Request(e.to_string()))?;

        let exchange = async {
            match &self.host {
                #[cfg(unix)]
                DockerHost::Unix(socket) => {
                    let stream = tokio::net::UnixStream::connect(socket)
                        .await
                        .map_err(|e| ContainerError::Connect(format!("{}: {e}", self.host)))?;
                    send(stream, req).await
                }
                #[cfg(not(unix))]
                DockerHost::Unix(_) => Err(ContainerError::InvalidHost(format!(
                    "{}: unix sockets are not supported on this platform",
                    self.host
                ))),
                DockerHost::Tcp(addr) => {
                    let stream = tokio::net::TcpStream::connect(addr.as_str())
                        .await
                        .map_err(|e| ContainerError::Connect(format!("{}: {e}", self.host)))?;
                    send(stream, req).await
                }
            }
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| ContainerError::Timeout(timeout))?
    }
}

impl ContainerControl for DockerClient {
    fn restart<'a>(&'a self, name: &'a str, timeout: Duration) -> RestartFuture<'a> {
        Box::pin(self.restart_container(name, timeout))
    }
}

/// Docker takes whole seconds; round up so a sub-second timeout never
/// becomes an immediate kill.
fn stop_seconds(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

/// Drive a single HTTP/1 exchange over an established stream.
async fn send<S>(stream: S, req: Request<Empty<Bytes>>) -> ContainerResult<(StatusCode, Bytes)>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| ContainerError::Request(e.to_string()))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "docker connection closed");
        }
    });

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| ContainerError::Request(e.to_string()))?;
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| ContainerError::Request(e.to_string()))?
        .to_bytes();
    Ok((status, body))
}

fn api_error(status: StatusCode, body: &[u8]) -> ContainerError {
    let message = match serde_json::from_slice::<DockerErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    };
    ContainerError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Docker names are `[a-zA-Z0-9][a-zA-Z0-9_.-]*`, optionally with a leading `/`.
fn validate_container_name(name: &str) -> ContainerResult<&str> {
    let trimmed = name.strip_prefix('/').unwrap_or(name);
    let mut chars = trimmed.chars();
    let valid_first = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid_first && valid_rest {
        Ok(trimmed)
    } else {
        Err(ContainerError::InvalidName(name.to_string()))
    }
}
