//! Test fixtures and scripted collaborators for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use quake_sidecar::error::SidecarError;
use quake_sidecar::orchestration::OrchestrationClient;
use quake_sidecar::service::{GameServer, GameServerExit};
use quake_sidecar::status::StatusSource;
use quake_sidecar::types::{PlayerSnapshot, StatusSnapshot};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The two-player `q3dm1` snapshot used across tests
pub fn q3dm1_snapshot() -> StatusSnapshot {
    StatusSnapshot::new(
        "q3dm1",
        vec![
            PlayerSnapshot::new("Ann", 10, 40),
            PlayerSnapshot::new("Bob", -1, 999),
        ],
    )
}

/// Orchestrator that records every call and fails on request
#[derive(Debug, Default)]
pub struct ScriptedOrchestrator {
    calls: Mutex<Vec<String>>,
    /// Outcomes for upcoming health pings; `true` succeeds
    health_script: Mutex<VecDeque<bool>>,
    /// Outcome once the script runs out
    health_fails: AtomicBool,
    failing_players: Mutex<HashSet<String>>,
    fail_ready: AtomicBool,
}

impl ScriptedOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every health ping fails
    pub fn failing_health() -> Self {
        let orchestrator = Self::new();
        orchestrator.health_fails.store(true, Ordering::SeqCst);
        orchestrator
    }

    /// Health pings follow `outcomes`, then succeed
    pub fn with_health_script(outcomes: impl IntoIterator<Item = bool>) -> Self {
        let orchestrator = Self::new();
        orchestrator
            .health_script
            .lock()
            .unwrap()
            .extend(outcomes);
        orchestrator
    }

    pub fn reject_player(&self, name: &str) {
        self.failing_players
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    pub fn fail_ready(&self) {
        self.fail_ready.store(true, Ordering::SeqCst);
    }

    /// All calls in order, as `ready`, `health` or `connect:<name>`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn health_calls(&self) -> usize {
        self.calls().iter().filter(|c| *c == "health").count()
    }

    pub fn connect_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("connect:").map(str::to_string))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl OrchestrationClient for ScriptedOrchestrator {
    async fn ready(&self) -> Result<(), SidecarError> {
        self.record("ready".to_string());
        if self.fail_ready.load(Ordering::SeqCst) {
            return Err(SidecarError::transport("/ready", "connection refused"));
        }
        Ok(())
    }

    async fn health(&self) -> Result<(), SidecarError> {
        self.record("health".to_string());
        let ok = self
            .health_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(!self.health_fails.load(Ordering::SeqCst));
        if ok {
            Ok(())
        } else {
            Err(SidecarError::transport("/health", "connection refused"))
        }
    }

    async fn player_connect(&self, name: &str) -> Result<(), SidecarError> {
        if self.failing_players.lock().unwrap().contains(name) {
            return Err(SidecarError::Registration {
                player: name.to_string(),
                message: "HTTP 400 Bad Request".to_string(),
            });
        }
        self.record(format!("connect:{}", name));
        Ok(())
    }
}

/// Status source replaying queued replies, then a fixed fallback
#[derive(Debug)]
pub struct ScriptedStatusSource {
    replies: Mutex<VecDeque<Result<StatusSnapshot, SidecarError>>>,
    fallback: Result<StatusSnapshot, SidecarError>,
    queries: AtomicUsize,
}

impl ScriptedStatusSource {
    pub fn always(reply: Result<StatusSnapshot, SidecarError>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: reply,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn push_reply(&self, reply: Result<StatusSnapshot, SidecarError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for ScriptedStatusSource {
    async fn query(&self, _address: &str) -> Result<StatusSnapshot, SidecarError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Game server that runs until cancelled or exits after a set time
#[derive(Debug, Clone)]
pub struct ControlledGameServer {
    exit_after: Option<(Duration, GameServerExit)>,
    fail_start: bool,
    stopped: Arc<AtomicBool>,
}

impl ControlledGameServer {
    /// Runs until the supervisor cancels it
    pub fn until_cancelled() -> Self {
        Self {
            exit_after: None,
            fail_start: false,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Exits with `code` after `delay` unless cancelled first
    pub fn exiting_after(delay: Duration, code: i32) -> Self {
        Self {
            exit_after: Some((
                delay,
                GameServerExit::Exited {
                    success: code == 0,
                    code: Some(code),
                },
            )),
            ..Self::until_cancelled()
        }
    }

    /// Fails before the process starts
    pub fn failing_to_start() -> Self {
        Self {
            fail_start: true,
            ..Self::until_cancelled()
        }
    }

    /// Whether the server observed cancellation
    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GameServer for ControlledGameServer {
    async fn run(&self, token: CancellationToken) -> Result<GameServerExit, SidecarError> {
        if self.fail_start {
            return Err(SidecarError::Process {
                message: "failed to start ioq3ded: No such file or directory".to_string(),
            });
        }

        let exit = async {
            match self.exit_after {
                Some((delay, exit)) => {
                    tokio::time::sleep(delay).await;
                    exit
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            exit = exit => Ok(exit),
            _ = token.cancelled() => {
                self.stopped.store(true, Ordering::SeqCst);
                Ok(GameServerExit::Stopped)
            }
        }
    }
}
