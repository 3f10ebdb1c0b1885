//! Game-server status polling
//!
//! Each cycle reads one status snapshot, applies it to the metrics sink and
//! then registers every listed player with the orchestrator. A failed read
//! skips the cycle; it never escalates, since liveness is judged only by the
//! health monitor.

use crate::error::SidecarError;
use crate::metrics::MetricsSink;
use crate::orchestration::OrchestrationClient;
use crate::status::StatusSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Result of one poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The status read failed and nothing was updated
    Skipped(SidecarError),
    /// Metrics were applied and registration was attempted for every player
    Reported { players: usize, registered: usize },
}

/// Periodic status reader fanning snapshots out to metrics and orchestration
pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    sink: Arc<MetricsSink>,
    orchestrator: Arc<dyn OrchestrationClient>,
    address: String,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(
        source: Arc<dyn StatusSource>,
        sink: Arc<MetricsSink>,
        orchestrator: Arc<dyn OrchestrationClient>,
        address: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            orchestrator,
            address: address.into(),
            interval,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Run a single poll cycle
    pub async fn poll_once(&self) -> PollOutcome {
        let snapshot = match self.source.query(&self.address).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("[status] failed to get status from {}: {}", self.address, e);
                return PollOutcome::Skipped(e);
            }
        };

        // Metrics first, so they reflect the snapshot even if registration fails.
        self.sink.report(&snapshot);

        let mut registered = 0;
        for player in &snapshot.players {
            debug!("[status] player: {}", player.name);
            match self.orchestrator.player_connect(&player.name).await {
                Ok(()) => registered += 1,
                Err(e) => warn!("[status] failed to register player '{}': {}", player.name, e),
            }
        }

        debug!(
            "[status] status checked: map '{}', {} players, {} registered",
            snapshot.map_name,
            snapshot.players.len(),
            registered
        );
        PollOutcome::Reported {
            players: snapshot.players.len(),
            registered,
        }
    }

    /// Poll until cancelled
    ///
    /// Cancellation is only observed between cycles; a query in flight is
    /// allowed to finish.
    pub async fn run(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "[status] polling {} every {:?}",
            self.address, self.interval
        );

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("[status] stopped status checks");
                    return;
                }
                _ = ticker.tick() => {}
            }

            self.poll_once().await;
        }
    }
}
