//! Main application configuration
//!
//! Defaults, optionally overlaid by a TOML file, then by environment
//! variables. Command line overrides are applied by the binary.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub agones: AgonesSettings,
    pub monitor: MonitorSettings,
    pub game_server: GameServerSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the metrics and health endpoints
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Orchestration SDK settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgonesSettings {
    /// Use the Agones SDK; without it the sidecar only exports metrics
    pub enabled: bool,
    /// Port of the SDK server's REST gateway
    pub sdk_http_port: u16,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

/// Health and status loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Interval between health pings in milliseconds
    pub health_interval_ms: u64,
    /// Consecutive failed pings tolerated before the sidecar gives up
    pub health_failure_threshold: u32,
    /// Interval between status polls in milliseconds
    pub status_interval_ms: u64,
    /// Timeout of a single status query in milliseconds
    pub status_query_timeout_ms: u64,
}

/// Dedicated server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameServerSettings {
    /// Dedicated server `<host>:<port>`
    pub address: String,
    /// Dedicated server binary
    pub binary: String,
    /// Server configuration file executed at startup
    pub config_file: Option<PathBuf>,
    /// Location of the game files
    pub assets_dir: PathBuf,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "quake-sidecar".to_string(),
            log_level: "info".to_string(),
            metrics_port: 9090,
            shutdown_timeout_seconds: 10,
        }
    }
}

impl Default for AgonesSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            sdk_http_port: 9358,
            request_timeout_ms: 2000,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            health_interval_ms: 2000,
            health_failure_threshold: 5,
            status_interval_ms: 5000,
            status_query_timeout_ms: 3000,
        }
    }
}

impl Default for GameServerSettings {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:27960".to_string(),
            binary: "ioq3ded".to_string(),
            config_file: None,
            assets_dir: PathBuf::from("assets"),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", key, value)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let config = Self::load_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Self::load_file(path)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Like [`AppConfig::from_env`], but leaves validation to the caller
    ///
    /// Used when further overrides are applied before the values are checked.
    pub fn load_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Like [`AppConfig::from_file`], but leaves validation to the caller
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay environment variables onto this configuration
    pub fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(port) = parse_env("METRICS_PORT")? {
            self.service.metrics_port = port;
        }
        if let Some(timeout) = parse_env("SHUTDOWN_TIMEOUT_SECONDS")? {
            self.service.shutdown_timeout_seconds = timeout;
        }

        // Agones settings
        if let Some(enabled) = parse_env("WITH_AGONES")? {
            self.agones.enabled = enabled;
        }
        if let Some(port) = parse_env("AGONES_SDK_HTTP_PORT")? {
            self.agones.sdk_http_port = port;
        }
        if let Some(timeout) = parse_env("AGONES_REQUEST_TIMEOUT_MS")? {
            self.agones.request_timeout_ms = timeout;
        }

        // Monitor settings
        if let Some(interval) = parse_env("HEALTH_INTERVAL_MS")? {
            self.monitor.health_interval_ms = interval;
        }
        if let Some(threshold) = parse_env("HEALTH_FAILURE_THRESHOLD")? {
            self.monitor.health_failure_threshold = threshold;
        }
        if let Some(interval) = parse_env("STATUS_INTERVAL_MS")? {
            self.monitor.status_interval_ms = interval;
        }
        if let Some(timeout) = parse_env("STATUS_QUERY_TIMEOUT_MS")? {
            self.monitor.status_query_timeout_ms = timeout;
        }

        // Game server settings
        if let Ok(address) = env::var("SERVER_ADDR") {
            self.game_server.address = address;
        }
        if let Ok(binary) = env::var("SERVER_BINARY") {
            self.game_server.binary = binary;
        }
        if let Ok(config_file) = env::var("SERVER_CONFIG_FILE") {
            self.game_server.config_file = Some(PathBuf::from(config_file));
        }
        if let Ok(assets_dir) = env::var("ASSETS_DIR") {
            self.game_server.assets_dir = PathBuf::from(assets_dir);
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get Agones request timeout as Duration
    pub fn agones_request_timeout(&self) -> Duration {
        Duration::from_millis(self.agones.request_timeout_ms)
    }

    /// Get health ping interval as Duration
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.health_interval_ms)
    }

    /// Get status poll interval as Duration
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.status_interval_ms)
    }

    /// Get status query timeout as Duration
    pub fn status_query_timeout(&self) -> Duration {
        Duration::from_millis(self.monitor.status_query_timeout_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.metrics_port == 0 {
        return Err(anyhow!("Metrics port cannot be 0"));
    }
    if config.agones.enabled && config.agones.sdk_http_port == 0 {
        return Err(anyhow!("Agones SDK port cannot be 0"));
    }

    // Validate timeouts and intervals
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.agones.request_timeout_ms == 0 {
        return Err(anyhow!("Agones request timeout must be greater than 0"));
    }
    if config.monitor.health_interval_ms == 0 {
        return Err(anyhow!("Health interval must be greater than 0"));
    }
    if config.monitor.status_interval_ms == 0 {
        return Err(anyhow!("Status interval must be greater than 0"));
    }
    if config.monitor.status_query_timeout_ms == 0 {
        return Err(anyhow!("Status query timeout must be greater than 0"));
    }

    // Validate game server settings
    if config.game_server.address.is_empty() {
        return Err(anyhow!("Game server address cannot be empty"));
    }
    if !config.game_server.address.contains(':') {
        return Err(anyhow!(
            "Game server address must be <host>:<port>: {}",
            config.game_server.address
        ));
    }
    if config.game_server.binary.is_empty() {
        return Err(anyhow!("Game server binary cannot be empty"));
    }

    Ok(())
}
