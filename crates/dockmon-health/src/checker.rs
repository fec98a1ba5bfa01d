//! Liveness checks.
//!
//! Performs one bounded HTTP GET against a target's liveness URL. Redirects
//! are followed and HTTPS is supported; only the final status counts. There
//! are no retries here: retrying is the scheduler's job, one interval later.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;

use dockmon_core::TargetDefinition;

const USER_AGENT: &str = concat!("dockmon-health/", env!("CARGO_PKG_VERSION"));

/// Result of a single liveness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// The endpoint answered 200 OK.
    Healthy,
    /// Transport error, timeout, or any final status other than 200.
    Unhealthy(String),
}

impl ProbeResult {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeResult::Healthy)
    }
}

/// Boxed future returned by [`LivenessProbe::check`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = ProbeResult> + Send + 'a>>;

/// Performs one health check against a target. Injected into the
/// scheduler so tests can script results.
pub trait LivenessProbe: Send + Sync {
    fn check<'a>(&'a self, target: &'a TargetDefinition) -> ProbeFuture<'a>;
}

/// HTTP prober sharing one connection pool across every target.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    /// Checker whose every request, redirects included, must finish within
    /// `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl LivenessProbe for HttpProber {
    fn check<'a>(&'a self, target: &'a TargetDefinition) -> ProbeFuture<'a> {
        Box::pin(http_probe(&self.client, target.liveness_url()))
    }
}

/// Perform one HTTP liveness check against `url` with `client`.
///
/// Returns `Healthy` only when the final response, after redirects, is 200.
/// The request deadline is the client's timeout.
pub async fn http_probe(client: &reqwest::Client, url: &str) -> ProbeResult {
    match client.get(url).send().await {
        Ok(resp) if resp.status() == StatusCode::OK => ProbeResult::Healthy,
        Ok(resp) => {
            debug!(status = %resp.status(), final_url = %resp.url(), %url, "liveness check non-200");
            ProbeResult::Unhealthy(format!("unexpected status {}", resp.status()))
        }
        Err(e) if e.is_timeout() => {
            debug!(%url, "liveness check timed out");
            ProbeResult::Unhealthy("timed out".to_string())
        }
        Err(e) if e.is_builder() => ProbeResult::Unhealthy(format!("invalid liveness url {url}: {e}")),
        Err(e) => {
            debug!(error = %e, %url, "liveness check request failed");
            ProbeResult::Unhealthy(format!("request failed: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn prober() -> HttpProber {
        HttpProber::new(TIMEOUT).unwrap()
    }

    /// Serve every connection with `respond(request_line)`, closing after
    /// each response. Returns the address and the request lines seen.
    async fn serve(
        respond: fn(&str) -> String,
    ) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).into_owned();
                let line = head.lines().next().unwrap_or_default().to_string();
                let response = respond(&line);
                log.lock().unwrap().push(line);
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        (addr, seen)
    }

    fn reply(status: &str) -> String {
        format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
    }

    #[tokio::test]
    async fn ok_response_is_healthy() {
        let (addr, seen) = serve(|_| reply("200 OK")).await;

        let result = http_probe(&prober().client, &format!("http://{addr}/health?deep=1")).await;
        assert_eq!(result, ProbeResult::Healthy);
        assert_eq!(seen.lock().unwrap()[0], "GET /health?deep=1 HTTP/1.1");
    }

    #[tokio::test]
    async fn server_error_is_unhealthy() {
        let (addr, _) = serve(|_| reply("503 Service Unavailable")).await;

        let result = http_probe(&prober().client, &format!("http://{addr}/health")).await;
        assert!(matches!(result, ProbeResult::Unhealthy(reason) if reason.contains("503")));
    }

    #[tokio::test]
    async fn only_200_counts_as_healthy() {
        let (addr, _) = serve(|_| reply("204 No Content")).await;

        let result = http_probe(&prober().client, &format!("http://{addr}/health")).await;
        assert!(!result.is_healthy());
    }

    #[tokio::test]
    async fn redirect_to_healthy_endpoint_is_healthy() {
        let (addr, seen) = serve(|line| {
            if line.starts_with("GET /health ") {
                "HTTP/1.1 301 Moved Permanently\r\nlocation: /health/\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                    .to_string()
            } else {
                reply("200 OK")
            }
        })
        .await;

        let result = http_probe(&prober().client, &format!("http://{addr}/health")).await;
        assert_eq!(result, ProbeResult::Healthy);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["GET /health HTTP/1.1".to_string(), "GET /health/ HTTP/1.1".to_string()]
        );
    }

    #[tokio::test]
    async fn redirect_to_failing_endpoint_is_unhealthy() {
        let (addr, _) = serve(|line| {
            if line.starts_with("GET /health ") {
                "HTTP/1.1 302 Found\r\nlocation: /down\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                    .to_string()
            } else {
                reply("500 Internal Server Error")
            }
        })
        .await;

        let result = http_probe(&prober().client, &format!("http://{addr}/health")).await;
        assert!(matches!(result, ProbeResult::Unhealthy(reason) if reason.contains("500")));
    }

    #[tokio::test]
    async fn closed_port_is_unhealthy() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = http_probe(&prober().client, &format!("http://{addr}/health")).await;
        assert!(matches!(result, ProbeResult::Unhealthy(reason) if reason.contains("request failed")));
    }

    #[tokio::test]
    async fn hung_endpoint_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let prober = HttpProber::new(Duration::from_millis(100)).unwrap();
        let result = http_probe(&prober.client, &format!("http://{addr}/health")).await;
        assert!(matches!(result, ProbeResult::Unhealthy(reason) if reason.contains("timed out")));
    }

    #[tokio::test]
    async fn malformed_urls_are_unhealthy() {
        for url in ["not a url", "/relative"] {
            assert!(!http_probe(&prober().client, url).await.is_healthy(), "{url}");
        }
    }

    #[tokio::test]
    async fn prober_checks_target_url() {
        let (addr, seen) = serve(|_| reply("200 OK")).await;
        let target = TargetDefinition::new(
            "api",
            format!("http://{addr}/live"),
            Duration::from_secs(5),
            true,
            3,
        )
        .unwrap();

        let prober = prober();
        assert_eq!(prober.timeout(), TIMEOUT);
        let checker: &dyn LivenessProbe = &prober;
        assert_eq!(checker.check(&target).await, ProbeResult::Healthy);
        assert_eq!(seen.lock().unwrap()[0], "GET /live HTTP/1.1");
    }
}
