//! Prometheus scrape endpoint and health probes
//!
//! Serves the sink's registry plus liveness information derived from the
//! orchestrator health monitor, using Axum.

use crate::metrics::collector::MetricsSink;
use crate::types::HealthStatus;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Metrics server configuration
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Port to bind the metrics server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
    /// Service name reported by the JSON endpoints
    pub service_name: String,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self {
            port: 9090,
            host: "0.0.0.0".to_string(),
            service_name: "quake-sidecar".to_string(),
        }
    }
}

/// Shared state for the metrics server
#[derive(Clone)]
pub struct MetricsServerState {
    pub sink: Arc<MetricsSink>,
    pub health: watch::Receiver<HealthStatus>,
    pub service_name: String,
}

/// HTTP server exposing `/metrics`, `/health` and `/alive`
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: MetricsServerState,
    shutdown: CancellationToken,
}

impl MetricsServer {
    /// Create a new metrics server
    pub fn new(
        config: MetricsServerConfig,
        sink: Arc<MetricsSink>,
        health: watch::Receiver<HealthStatus>,
    ) -> Self {
        let service_name = config.service_name.clone();

        Self {
            config,
            state: MetricsServerState {
                sink,
                health,
                service_name,
            },
            shutdown: CancellationToken::new(),
        }
    }

    /// Bind and serve until [`MetricsServer::stop`] is called
    ///
    /// Returns immediately if `stop` was already called.
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid metrics server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind metrics server to {}", addr))?;

        info!("[metrics] listening on http://{}", addr);

        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("[metrics] shutdown signal received");
            })
            .await?;

        info!("[metrics] server stopped");
        Ok(())
    }

    /// Create the Axum router with all endpoints
    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
    }

    /// Stop the metrics server, whether or not it has started yet
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

/// Root endpoint handler - shows service information
async fn root_handler(State(state): State<MetricsServerState>) -> impl IntoResponse {
    Json(json!({
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/alive", "/metrics"]
    }))
}

/// Health endpoint handler - reports the orchestrator health monitor state
async fn health_handler(State(state): State<MetricsServerState>) -> impl IntoResponse {
    debug!("[metrics] health requested");

    let status = *state.health.borrow();
    let code = if status.is_fatal() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        code,
        Json(json!({
            "status": status.label(),
            "consecutive_failures": status.consecutive_failures(),
            "service": state.service_name,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now()
        })),
    )
}

/// Liveness check endpoint handler
async fn alive_handler(State(state): State<MetricsServerState>) -> impl IntoResponse {
    if state.health.borrow().is_fatal() {
        (StatusCode::SERVICE_UNAVAILABLE, "Not alive")
    } else {
        (StatusCode::OK, "Alive")
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<MetricsServerState>) -> Response {
    match state.sink.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, state.sink.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("[metrics] {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}
