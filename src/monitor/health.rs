//! Orchestrator health pings with failure-threshold escalation
//!
//! A ping goes out on every tick. Consecutive failures are counted and any
//! success resets the count. Once the count exceeds the threshold the monitor
//! stops and hands a fatal outcome to its owner, which is expected to take the
//! process down so the orchestrator's restart policy takes over.

use crate::error::SidecarError;
use crate::orchestration::OrchestrationClient;
use crate::types::HealthStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Consecutive failure counter behind the health monitor
///
/// `Fatal` is terminal: once reached, further outcomes are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthState {
    consecutive_failures: u32,
    threshold: u32,
    fatal: bool,
}

impl HealthState {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold,
            fatal: false,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn status(&self) -> HealthStatus {
        match (self.fatal, self.consecutive_failures) {
            (true, failures) => HealthStatus::Fatal { failures },
            (false, 0) => HealthStatus::Healthy,
            (false, failures) => HealthStatus::Degraded { failures },
        }
    }

    pub fn record_success(&mut self) -> HealthStatus {
        if !self.fatal {
            self.consecutive_failures = 0;
        }
        self.status()
    }

    pub fn record_failure(&mut self) -> HealthStatus {
        if !self.fatal {
            self.consecutive_failures += 1;
            self.fatal = self.consecutive_failures > self.threshold;
        }
        self.status()
    }

    /// Record one ping outcome
    pub fn record<E>(&mut self, outcome: &Result<(), E>) -> HealthStatus {
        match outcome {
            Ok(()) => self.record_success(),
            Err(_) => self.record_failure(),
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

/// Why the health monitor returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorExit {
    /// The shared cancellation token fired
    Cancelled,
    /// Too many consecutive ping failures
    Fatal {
        failures: u32,
        last_error: SidecarError,
    },
}

/// Periodic liveness pinger
pub struct HealthMonitor {
    client: Arc<dyn OrchestrationClient>,
    interval: Duration,
    threshold: u32,
    status_tx: watch::Sender<HealthStatus>,
}

impl HealthMonitor {
    pub fn new(client: Arc<dyn OrchestrationClient>, interval: Duration, threshold: u32) -> Self {
        let (status_tx, _) = watch::channel(HealthStatus::Healthy);
        Self {
            client,
            interval,
            threshold,
            status_tx,
        }
    }

    /// Follow the monitor's state transitions
    pub fn subscribe(&self) -> watch::Receiver<HealthStatus> {
        self.status_tx.subscribe()
    }

    /// Ping until cancelled or until the failure threshold is exceeded
    ///
    /// Cancellation is only observed between pings; a ping in flight is
    /// allowed to finish.
    pub async fn run(self, token: CancellationToken) -> MonitorExit {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut state = HealthState::new(self.threshold);

        info!(
            "[health] sending health pings every {:?} (failure threshold {})",
            self.interval, self.threshold
        );

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("[health] stopped health pings");
                    return MonitorExit::Cancelled;
                }
                _ = ticker.tick() => {}
            }

            let outcome = self.client.health().await;
            let previous = state.consecutive_failures();
            let status = state.record(&outcome);
            self.status_tx.send_replace(status);

            match (outcome, status) {
                (Err(e), HealthStatus::Fatal { failures }) => {
                    error!(
                        "[health] could not send health ping after {} consecutive failures: {}",
                        failures, e
                    );
                    return MonitorExit::Fatal {
                        failures,
                        last_error: e,
                    };
                }
                (Err(e), _) => {
                    warn!(
                        "[health] health ping failed ({}/{}): {}",
                        state.consecutive_failures(),
                        self.threshold,
                        e
                    );
                }
                (Ok(()), _) if previous > 0 => {
                    info!(
                        "[health] health ping recovered after {} failures",
                        previous
                    );
                }
                (Ok(()), _) => debug!("[health] health ping ok"),
            }
        }
    }
}
