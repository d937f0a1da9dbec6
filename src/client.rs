//! Control-plane client.
//!
//! Thin HTTP client for driving a running stub server: state resets before
//! each test, the graceful stop at suite teardown, and the readiness polling
//! external runners use as their startup gate. Backs the `stop`, `reset`,
//! and `status` CLI commands.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::debug;
use url::Url;

use crate::error::{Result, StubError};
use crate::router::{HEALTH_PATH, RESET_PATH, STOP_PATH};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Acknowledgement returned by `POST /_reset`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetAck {
    pub reset: bool,
    pub generation: u64,
}

/// Acknowledgement returned by `GET /stop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopAck {
    pub stopping: bool,
}

/// Body returned by `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub generation: u64,
}

/// Client for a stub server's control endpoints.
#[derive(Debug, Clone)]
pub struct ControlClient {
    http: Client,
    base_url: Url,
}

impl ControlClient {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self { http, base_url })
    }

    /// Client for a local server on `port`.
    pub fn for_port(port: u16) -> Result<Self> {
        Self::new(&format!("http://127.0.0.1:{port}"))
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Restore the server's fixtures to their baseline.
    pub async fn reset(&self) -> Result<ResetAck> {
        let response = self.http.post(self.endpoint(RESET_PATH)?).send().await?;
        Self::parse(response).await
    }

    /// Ask the server to drain and shut down.
    pub async fn stop(&self) -> Result<StopAck> {
        let response = self.http.get(self.endpoint(STOP_PATH)?).send().await?;
        Self::parse(response).await
    }

    /// Fetch the server's health status.
    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self.http.get(self.endpoint(HEALTH_PATH)?).send().await?;
        Self::parse(response).await
    }

    /// Poll `path` until it answers 2xx, or time out.
    ///
    /// Connection refusals are expected while the server is still binding and
    /// are retried silently.
    pub async fn await_ready(&self, path: &str, timeout: Duration) -> Result<()> {
        let url = self.endpoint(path)?;
        let deadline = Instant::now() + timeout;
        let mut attempts = 0u32;

        while Instant::now() < deadline {
            attempts += 1;
            match self.http.get(url.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(%url, attempts, "readiness probe answered");
                    return Ok(());
                }
                Ok(response) => {
                    debug!(%url, status = %response.status(), "readiness probe not ready");
                }
                Err(e) if e.is_connect() => {}
                Err(e) => debug!(%url, error = %e, "readiness probe error"),
            }
            sleep(READY_POLL_INTERVAL).await;
        }

        Err(StubError::ReadyTimeout {
            seconds: timeout.as_secs(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(StubError::from)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status.to_string()
            } else {
                body
            };
            return Err(StubError::Control {
                message,
                status: Some(status.as_u16()),
            });
        }

        Ok(response.json().await?)
    }
}
