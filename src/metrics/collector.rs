//! Game-server metrics using Prometheus
//!
//! The series names are consumed by existing dashboards and must not change.

use crate::types::StatusSnapshot;
use anyhow::Result;
use prometheus::core::Collector;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounter, Opts, Registry, TextEncoder};
use std::sync::Arc;

pub const ACTIVE_PLAYERS: &str = "quake_active_players";
pub const PLAYER_SCORES: &str = "quake_player_scores";
pub const PLAYER_PINGS: &str = "quake_player_pings";
pub const CONFIG_RELOADS: &str = "quake_config_reloads";

/// Metrics sink fed by the status poller
///
/// Each instance owns its own registry, so tests can build isolated sinks.
/// Series for players that leave are never removed.
#[derive(Clone)]
pub struct MetricsSink {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Number of players in the latest snapshot
    active_players: Gauge,

    /// Score by player and map
    scores: GaugeVec,

    /// Ping by player
    pings: GaugeVec,

    /// Config file reloads, incremented by the config watcher
    config_reloads: IntCounter,
}

impl MetricsSink {
    /// Create a new sink with a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create a new sink registering into `registry`
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let active_players = Gauge::new(ACTIVE_PLAYERS, "The current number of active players")?;
        registry.register(Box::new(active_players.clone()))?;

        let scores = GaugeVec::new(
            Opts::new(PLAYER_SCORES, "Current scores by player, by map"),
            &["player", "map"],
        )?;
        registry.register(Box::new(scores.clone()))?;

        let pings = GaugeVec::new(
            Opts::new(PLAYER_PINGS, "Current ping by player"),
            &["player"],
        )?;
        registry.register(Box::new(pings.clone()))?;

        let config_reloads = IntCounter::new(CONFIG_RELOADS, "Config file reload count")?;
        registry.register(Box::new(config_reloads.clone()))?;

        Ok(Self {
            registry,
            active_players,
            scores,
            pings,
            config_reloads,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Apply one status snapshot; last write wins per series
    pub fn report(&self, snapshot: &StatusSnapshot) {
        self.active_players.set(snapshot.players.len() as f64);

        for player in &snapshot.players {
            if snapshot.has_map() {
                self.scores
                    .with_label_values(&[player.name.as_str(), snapshot.map_name.as_str()])
                    .set(player.score as f64);
            }
            self.pings
                .with_label_values(&[player.name.as_str()])
                .set(player.ping as f64);
        }
    }

    /// Count one config file reload
    pub fn record_config_reload(&self) {
        self.config_reloads.inc();
    }

    pub fn active_players(&self) -> f64 {
        self.active_players.get()
    }

    /// Score series for a player on a map, if one was ever written
    pub fn score(&self, player: &str, map: &str) -> Option<f64> {
        find_gauge(&self.scores, &[("player", player), ("map", map)])
    }

    /// Ping series for a player, if one was ever written
    pub fn ping(&self, player: &str) -> Option<f64> {
        find_gauge(&self.pings, &[("player", player)])
    }

    /// Number of score series currently exported
    pub fn score_series(&self) -> usize {
        series_count(&self.scores)
    }

    /// Number of ping series currently exported
    pub fn ping_series(&self) -> usize {
        series_count(&self.pings)
    }

    pub fn config_reloads(&self) -> u64 {
        self.config_reloads.get()
    }

    /// Encode the registry in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        encoder
            .encode_to_string(&families)
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))
    }

    /// Content type of [`MetricsSink::render`]
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

fn find_gauge(vec: &GaugeVec, labels: &[(&str, &str)]) -> Option<f64> {
    vec.collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .find(|metric| {
            let pairs = metric.get_label();
            labels.iter().all(|(name, value)| {
                pairs
                    .iter()
                    .any(|pair| pair.get_name() == *name && pair.get_value() == *value)
            })
        })
        .map(|metric| metric.get_gauge().get_value())
}

fn series_count(vec: &GaugeVec) -> usize {
    vec.collect()
        .iter()
        .map(|family| family.get_metric().len())
        .sum()
}
