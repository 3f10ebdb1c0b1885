//! Dedicated server process management

use crate::config::GameServerSettings;
use crate::error::SidecarError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::ExitStatus;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How the game server stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameServerExit {
    /// The process ended on its own
    Exited { success: bool, code: Option<i32> },
    /// The process was stopped because the supervisor cancelled
    Stopped,
}

impl GameServerExit {
    pub fn from_status(status: ExitStatus) -> Self {
        GameServerExit::Exited {
            success: status.success(),
            code: status.code(),
        }
    }
}

/// A supervised game-server process
#[async_trait]
pub trait GameServer: Send + Sync {
    /// Run the server until it exits or `token` is cancelled
    async fn run(&self, token: CancellationToken) -> Result<GameServerExit, SidecarError>;
}

/// Quake 3 dedicated server launched as a child process
#[derive(Debug, Clone)]
pub struct Quake3Server {
    binary: String,
    address: String,
    config_file: Option<PathBuf>,
    assets_dir: PathBuf,
}

impl Quake3Server {
    pub fn new(settings: &GameServerSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            address: settings.address.clone(),
            config_file: settings.config_file.clone(),
            assets_dir: settings.assets_dir.clone(),
        }
    }

    /// Command line passed to the dedicated server binary
    pub fn args(&self) -> Result<Vec<String>, SidecarError> {
        let (host, port) = self
            .address
            .rsplit_once(':')
            .ok_or_else(|| SidecarError::Configuration {
                message: format!("server address must be <host>:<port>: {}", self.address),
            })?;
        let host = host.trim_start_matches('[').trim_end_matches(']');

        let mut args = vec![
            "+set".to_string(),
            "dedicated".to_string(),
            "1".to_string(),
            "+set".to_string(),
            "net_ip".to_string(),
            host.to_string(),
            "+set".to_string(),
            "net_port".to_string(),
            port.to_string(),
            "+set".to_string(),
            "fs_homepath".to_string(),
            self.assets_dir.display().to_string(),
        ];
        if let Some(config_file) = &self.config_file {
            args.push("+exec".to_string());
            args.push(config_file.display().to_string());
        }
        Ok(args)
    }
}

#[async_trait]
impl GameServer for Quake3Server {
    async fn run(&self, token: CancellationToken) -> Result<GameServerExit, SidecarError> {
        let args = self.args()?;
        info!("[game-server] starting {} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(&args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SidecarError::Process {
                message: format!("failed to start {}: {}", self.binary, e),
            })?;

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| SidecarError::Process {
                    message: format!("failed to wait for {}: {}", self.binary, e),
                })?;
                let exit = GameServerExit::from_status(status);
                if status.success() {
                    info!("[game-server] exited cleanly");
                } else {
                    warn!("[game-server] exited with {}", status);
                }
                Ok(exit)
            }
            _ = token.cancelled() => {
                info!("[game-server] stopping dedicated server");
                if let Err(e) = child.kill().await {
                    warn!("[game-server] failed to kill dedicated server: {}", e);
                }
                Ok(GameServerExit::Stopped)
            }
        }
    }
}
