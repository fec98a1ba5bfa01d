//! Blocking client for the dockmond REST API.

use std::time::Duration;

use anyhow::{Context, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use dockmon_state::ServiceStatus;

use crate::config::CliConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// The `{success, data, error}` envelope every API response uses.
#[derive(Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

impl ApiClient {
    pub fn new(config: &CliConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("dockmon-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            http,
            base_url: normalize_host(&config.host),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Build a client from stored config and verify its credentials.
    pub fn connect(config: &CliConfig) -> anyhow::Result<Self> {
        let client = Self::new(config)?;
        client.login()?;
        Ok(client)
    }

    pub fn login(&self) -> anyhow::Result<()> {
        let resp = self.send(self.http.post(self.url("/api/login")))?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            bail!("invalid login credentials");
        }
        unwrap_envelope::<serde_json::Value>(resp).map(drop)
    }

    pub fn get_statuses(&self) -> anyhow::Result<Vec<ServiceStatus>> {
        let resp = self.send(self.http.get(self.url("/api/statuses")))?;
        unwrap_envelope(resp)
    }

    pub fn get_status(&self, service_name: &str) -> anyhow::Result<ServiceStatus> {
        let req = self
            .http
            .get(self.url("/api/status"))
            .query(&[("serviceName", service_name)]);
        let resp = self.send(req)?;
        if resp.status() == StatusCode::NOT_FOUND {
            bail!("service not found: {service_name}");
        }
        unwrap_envelope(resp)
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }

    fn send(&self, req: RequestBuilder) -> anyhow::Result<Response> {
        let resp = req
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .with_context(|| format!("could not reach dockmond at {}", self.base_url))?;
        debug!(url = %resp.url(), status = resp.status().as_u16(), "api response");
        Ok(resp)
    }
}

fn unwrap_envelope<T: DeserializeOwned>(resp: Response) -> anyhow::Result<T> {
    let status = resp.status();
    let envelope: Envelope<T> = resp
        .json()
        .with_context(|| format!("unexpected response (HTTP {})", status.as_u16()))?;
    if !envelope.success {
        bail!(
            "request failed (HTTP {}): {}",
            status.as_u16(),
            envelope.error.unwrap_or_else(|| "unknown error".into())
        );
    }
    envelope.data.context("response carried no data")
}

/// Accept `host:port` as shorthand for `http://host:port`.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}
