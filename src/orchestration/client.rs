//! Orchestration SDK capability
//!
//! The health monitor calls `health`, the status poller calls
//! `player_connect`; both loops share one client, so implementations must be
//! safe for concurrent use.

use crate::error::SidecarError;
use async_trait::async_trait;
use tracing::debug;

/// Lifecycle calls made against the local orchestrator agent
#[async_trait]
pub trait OrchestrationClient: Send + Sync {
    /// Mark the game server as ready to accept players
    async fn ready(&self) -> Result<(), SidecarError>;

    /// Liveness ping
    async fn health(&self) -> Result<(), SidecarError>;

    /// Register a connected player; connecting an already known name is a no-op
    async fn player_connect(&self, name: &str) -> Result<(), SidecarError>;
}

/// Orchestrator used when the sidecar runs without an orchestration agent
///
/// Every call succeeds locally so the status poller keeps feeding metrics.
#[derive(Debug, Clone, Default)]
pub struct StandaloneOrchestrator;

impl StandaloneOrchestrator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OrchestrationClient for StandaloneOrchestrator {
    async fn ready(&self) -> Result<(), SidecarError> {
        debug!("[orchestration] standalone mode, ready is a no-op");
        Ok(())
    }

    async fn health(&self) -> Result<(), SidecarError> {
        Ok(())
    }

    async fn player_connect(&self, name: &str) -> Result<(), SidecarError> {
        debug!("[orchestration] standalone mode, not registering '{}'", name);
        Ok(())
    }
}
