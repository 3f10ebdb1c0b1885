//! Agones SDK client over the SDK server's REST gateway
//!
//! The SDK server runs next to the game server in the same pod and listens on
//! `localhost:${AGONES_SDK_HTTP_PORT}` (9358 by default).

use crate::error::SidecarError;
use crate::orchestration::client::OrchestrationClient;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_SDK_HTTP_PORT: u16 = 9358;

const READY_PATH: &str = "/ready";
const HEALTH_PATH: &str = "/health";
const PLAYER_CONNECT_PATH: &str = "/alpha/player/connect";

/// Configuration for the Agones SDK gateway
#[derive(Debug, Clone)]
pub struct AgonesConfig {
    /// Gateway base URL, without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl AgonesConfig {
    pub fn for_port(port: u16, request_timeout: Duration) -> Self {
        Self {
            base_url: format!("http://localhost:{}", port),
            request_timeout,
        }
    }
}

impl Default for AgonesConfig {
    fn default() -> Self {
        Self::for_port(DEFAULT_SDK_HTTP_PORT, Duration::from_secs(2))
    }
}

#[derive(Debug, Serialize)]
struct PlayerId<'a> {
    #[serde(rename = "playerID")]
    player_id: &'a str,
}

/// `{"bool": true}` if the player was added, `false` if already connected
#[derive(Debug, Deserialize)]
struct BoolResponse {
    #[serde(rename = "bool", default)]
    value: bool,
}

/// Agones SDK client
///
/// `reqwest::Client` pools connections internally and is safe to share
/// between the health and status loops without extra locking.
#[derive(Debug, Clone)]
pub struct AgonesClient {
    http_client: HttpClient,
    config: AgonesConfig,
}

impl AgonesClient {
    /// Create a client for the configured gateway
    pub fn new(config: AgonesConfig) -> Result<Self, SidecarError> {
        let http_client = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SidecarError::Configuration {
                message: format!("Failed to build Agones HTTP client: {}", e),
            })?;

        info!("[orchestration] using Agones SDK gateway at {}", config.base_url);
        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &AgonesConfig {
        &self.config
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, SidecarError> {
        let url = format!("{}{}", self.config.base_url, path);
        self.http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SidecarError::transport(path, e))
    }

    async fn post_empty(&self, path: &str) -> Result<(), SidecarError> {
        let response = self.post(path, &json!({})).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SidecarError::transport(path, format!("HTTP {}", status)));
        }
        Ok(())
    }
}

#[async_trait]
impl OrchestrationClient for AgonesClient {
    async fn ready(&self) -> Result<(), SidecarError> {
        self.post_empty(READY_PATH).await
    }

    async fn health(&self) -> Result<(), SidecarError> {
        self.post_empty(HEALTH_PATH).await
    }

    async fn player_connect(&self, name: &str) -> Result<(), SidecarError> {
        let response = self
            .post(PLAYER_CONNECT_PATH, &PlayerId { player_id: name })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SidecarError::Registration {
                player: name.to_string(),
                message: format!("HTTP {} {}", status, detail.trim()),
            });
        }

        // An unreadable body after a 2xx still means the agent accepted the call.
        let added = response
            .json::<BoolResponse>()
            .await
            .map(|r| r.value)
            .unwrap_or(false);
        if added {
            debug!("[orchestration] player '{}' connected", name);
        } else {
            debug!("[orchestration] player '{}' already connected", name);
        }
        Ok(())
    }
}
