//! Sidecar lifecycle coordination
//!
//! The supervisor owns the cancellation token shared by the game-server
//! process and both monitoring loops. It starts everything, waits for the
//! first terminating condition and then winds the rest down.

use crate::config::AppConfig;
use crate::error::{Result, SidecarError};
use crate::metrics::MetricsSink;
use crate::monitor::{HealthMonitor, MonitorExit, StatusPoller};
use crate::orchestration::OrchestrationClient;
use crate::service::process::{GameServer, GameServerExit};
use crate::status::StatusSource;
use crate::types::HealthStatus;
use anyhow::anyhow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Timing and addressing for a supervised run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub address: String,
    pub health_interval: Duration,
    pub failure_threshold: u32,
    pub status_interval: Duration,
    /// Upper bound on waiting for tasks after cancellation
    pub shutdown_timeout: Duration,
}

impl SupervisorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            address: config.game_server.address.clone(),
            health_interval: config.health_interval(),
            failure_threshold: config.monitor.health_failure_threshold,
            status_interval: config.status_interval(),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Why the supervisor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// Shutdown was requested from outside
    Shutdown,
    /// The game-server process ended on its own
    GameServerExited { success: bool, code: Option<i32> },
    /// Health pings failed past the threshold
    HealthFatal { failures: u32 },
}

impl SupervisorExit {
    pub fn is_failure(&self) -> bool {
        match self {
            SupervisorExit::Shutdown => false,
            SupervisorExit::GameServerExited { success, .. } => !success,
            SupervisorExit::HealthFatal { .. } => true,
        }
    }

    /// Process exit code for the sidecar binary
    pub fn exit_code(&self) -> i32 {
        if self.is_failure() {
            1
        } else {
            0
        }
    }
}

/// First condition that ended the supervised run
enum Trigger {
    Shutdown,
    GameServer(std::result::Result<std::result::Result<GameServerExit, SidecarError>, JoinError>),
    Health(std::result::Result<MonitorExit, JoinError>),
}

/// Coordinates the game server, the health monitor and the status poller
pub struct Supervisor {
    settings: SupervisorSettings,
    game_server: Arc<dyn GameServer>,
    orchestrator: Arc<dyn OrchestrationClient>,
    health_monitor: HealthMonitor,
    status_poller: StatusPoller,
}

impl Supervisor {
    pub fn new(
        settings: SupervisorSettings,
        game_server: Arc<dyn GameServer>,
        orchestrator: Arc<dyn OrchestrationClient>,
        source: Arc<dyn StatusSource>,
        sink: Arc<MetricsSink>,
    ) -> Self {
        let health_monitor = HealthMonitor::new(
            orchestrator.clone(),
            settings.health_interval,
            settings.failure_threshold,
        );
        let status_poller = StatusPoller::new(
            source,
            sink,
            orchestrator.clone(),
            settings.address.clone(),
            settings.status_interval,
        );

        Self {
            settings,
            game_server,
            orchestrator,
            health_monitor,
            status_poller,
        }
    }

    /// Health transitions published by the monitor this supervisor runs
    pub fn health_status(&self) -> watch::Receiver<HealthStatus> {
        self.health_monitor.subscribe()
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Run until `shutdown` resolves, the game server exits or health turns fatal
    ///
    /// Returns an error only when the game server could not be run at all.
    pub async fn run<F>(self, shutdown: F) -> Result<SupervisorExit>
    where
        F: Future<Output = ()> + Send,
    {
        let Supervisor {
            settings,
            game_server,
            orchestrator,
            health_monitor,
            status_poller,
        } = self;
        let token = CancellationToken::new();

        info!("[supervisor] starting game server for {}", settings.address);
        let mut game_task = tokio::spawn({
            let token = token.clone();
            async move { game_server.run(token).await }
        });

        match orchestrator.ready().await {
            Ok(()) => info!("[orchestration] marked game server ready"),
            Err(e) => warn!("[orchestration] could not send ready message: {}", e),
        }

        let mut health_task = tokio::spawn(health_monitor.run(token.clone()));
        let mut status_task = tokio::spawn(status_poller.run(token.clone()));

        tokio::pin!(shutdown);
        let trigger = tokio::select! {
            _ = &mut shutdown => Trigger::Shutdown,
            result = &mut game_task => Trigger::GameServer(result),
            result = &mut health_task => Trigger::Health(result),
        };

        info!("[supervisor] stopping monitors and game server");
        token.cancel();
        let limit = settings.shutdown_timeout;

        let exit = match trigger {
            Trigger::Shutdown => {
                info!("[supervisor] shutdown requested");
                join_within(&mut game_task, "game-server", limit).await;
                join_within(&mut health_task, "health", limit).await;
                Ok(SupervisorExit::Shutdown)
            }
            Trigger::GameServer(result) => {
                join_within(&mut health_task, "health", limit).await;
                match result {
                    Ok(Ok(GameServerExit::Exited { success, code })) => {
                        if success {
                            info!("[supervisor] game server exited");
                        } else {
                            error!("[supervisor] game server exited unsuccessfully (code {:?})", code);
                        }
                        Ok(SupervisorExit::GameServerExited { success, code })
                    }
                    Ok(Ok(GameServerExit::Stopped)) => Ok(SupervisorExit::Shutdown),
                    Ok(Err(e)) => {
                        error!("[supervisor] game server could not run: {}", e);
                        Err(anyhow!(e))
                    }
                    Err(e) => Err(anyhow!("game server task failed: {}", e)),
                }
            }
            Trigger::Health(result) => {
                join_within(&mut game_task, "game-server", limit).await;
                match result {
                    Ok(MonitorExit::Fatal { failures, last_error }) => {
                        error!(
                            "[supervisor] orchestrator unreachable after {} failed health pings, last error: {}",
                            failures, last_error
                        );
                        Ok(SupervisorExit::HealthFatal { failures })
                    }
                    Ok(MonitorExit::Cancelled) => Ok(SupervisorExit::Shutdown),
                    Err(e) => Err(anyhow!("health monitor task failed: {}", e)),
                }
            }
        };

        join_within(&mut status_task, "status", limit).await;
        info!("[supervisor] all tasks stopped");
        exit
    }
}

/// Await a task that has been told to stop, aborting it if it overstays
async fn join_within<T>(handle: &mut JoinHandle<T>, name: &str, limit: Duration) -> Option<T> {
    match tokio::time::timeout(limit, &mut *handle).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            error!("[supervisor] {} task failed: {}", name, e);
            None
        }
        Err(_) => {
            warn!(
                "[supervisor] {} task did not stop within {:?}, aborting",
                name, limit
            );
            handle.abort();
            None
        }
    }
}
