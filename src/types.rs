//! Common types shared by the status, metrics and orchestration components

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One connected player as reported by the game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub name: String,
    pub score: i64,
    /// Round-trip time in milliseconds
    pub ping: i64,
}

impl PlayerSnapshot {
    pub fn new(name: impl Into<String>, score: i64, ping: i64) -> Self {
        Self {
            name: name.into(),
            score,
            ping,
        }
    }
}

/// One point-in-time read of the game server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Current map, empty if the server did not report one
    pub map_name: String,
    /// Players in the order the server listed them
    pub players: Vec<PlayerSnapshot>,
    /// Remaining server info pairs (hostname, gametype, ...)
    #[serde(default)]
    pub server_info: BTreeMap<String, String>,
}

impl StatusSnapshot {
    pub fn new(map_name: impl Into<String>, players: Vec<PlayerSnapshot>) -> Self {
        Self {
            map_name: map_name.into(),
            players,
            server_info: BTreeMap::new(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_map(&self) -> bool {
        !self.map_name.is_empty()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.server_info.get("sv_hostname").map(String::as_str)
    }
}

/// Health as seen by the orchestrator-facing monitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Degraded { failures: u32 },
    Fatal { failures: u32 },
}

impl HealthStatus {
    pub fn consecutive_failures(&self) -> u32 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Degraded { failures } | HealthStatus::Fatal { failures } => *failures,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, HealthStatus::Fatal { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded { .. } => "degraded",
            HealthStatus::Fatal { .. } => "fatal",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded { failures } => {
                write!(f, "degraded ({} consecutive failures)", failures)
            }
            HealthStatus::Fatal { failures } => {
                write!(f, "fatal ({} consecutive failures)", failures)
            }
        }
    }
}
