//! Main entry point for the Quake sidecar
//!
//! Starts the dedicated server, the orchestration loops and the metrics
//! endpoint, then waits for a signal or for the supervisor to stop on its own.

use anyhow::Result;
use clap::Parser;
use quake_sidecar::config::{validate_config, AppConfig};
use quake_sidecar::metrics::{MetricsServer, MetricsServerConfig, MetricsSink};
use quake_sidecar::orchestration::{
    AgonesClient, AgonesConfig, OrchestrationClient, StandaloneOrchestrator,
};
use quake_sidecar::service::{Quake3Server, Supervisor, SupervisorExit, SupervisorSettings};
use quake_sidecar::status::Quake3StatusClient;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Quake Sidecar - Quake 3 dedicated server with orchestration and metrics
#[derive(Parser)]
#[command(
    name = "quake-sidecar",
    version,
    about = "Runs a Quake 3 dedicated server and reports it to the orchestrator",
    long_about = "Quake Sidecar launches a Quake 3 dedicated server, sends periodic health pings \
                 to the Agones SDK, registers connected players, and exports scores and pings \
                 as Prometheus metrics."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Game server address override
    #[arg(long, value_name = "HOST:PORT", help = "Override game server address")]
    server_addr: Option<String>,

    /// Metrics port override
    #[arg(long, value_name = "PORT", help = "Override metrics server port")]
    metrics_port: Option<u16>,

    /// Enable the Agones integration
    #[arg(long, help = "Report readiness, health and players to the Agones SDK")]
    with_agones: bool,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting the server"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("[supervisor] failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("[supervisor] failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("[supervisor] received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("[supervisor] received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Quake Sidecar v{}", quake_sidecar::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Game server: {} ({})", config.game_server.address, config.game_server.binary);
    info!("   Metrics port: {}", config.service.metrics_port);
    if config.agones.enabled {
        info!("   Agones SDK port: {}", config.agones.sdk_http_port);
    } else {
        info!("   Agones: disabled");
    }
    info!(
        "   Health: every {:?}, threshold {}",
        config.health_interval(),
        config.monitor.health_failure_threshold
    );
    info!("   Status: every {:?}", config.status_interval());
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    // Validated once below, after the CLI has had its say
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::load_file(config_path)?
    } else {
        AppConfig::load_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(server_addr) = &args.server_addr {
        config.game_server.address = server_addr.clone();
    }

    if let Some(metrics_port) = args.metrics_port {
        config.service.metrics_port = metrics_port;
    }

    if args.with_agones {
        config.agones.enabled = true;
    }

    validate_config(&config)?;
    Ok(config)
}

/// Pick the orchestration backend for this run
fn build_orchestrator(config: &AppConfig) -> Result<Arc<dyn OrchestrationClient>> {
    if config.agones.enabled {
        let client = AgonesClient::new(AgonesConfig::for_port(
            config.agones.sdk_http_port,
            config.agones_request_timeout(),
        ))?;
        Ok(Arc::new(client))
    } else {
        info!("[orchestration] Agones disabled, running standalone");
        Ok(Arc::new(StandaloneOrchestrator::new()))
    }
}

async fn run(config: AppConfig) -> Result<SupervisorExit> {
    let sink = Arc::new(MetricsSink::new()?);
    let orchestrator = build_orchestrator(&config)?;
    let status_source = Arc::new(Quake3StatusClient::new(config.status_query_timeout()));
    let game_server = Arc::new(Quake3Server::new(&config.game_server));

    let supervisor = Supervisor::new(
        SupervisorSettings::from_config(&config),
        game_server,
        orchestrator,
        status_source,
        sink.clone(),
    );

    let metrics_server = Arc::new(MetricsServer::new(
        MetricsServerConfig {
            port: config.service.metrics_port,
            host: "0.0.0.0".to_string(),
            service_name: config.service.name.clone(),
        },
        sink,
        supervisor.health_status(),
    ));
    let metrics_task = {
        let metrics_server = metrics_server.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics_server.start().await {
                error!("[metrics] server error: {}", e);
            }
        })
    };

    info!("Quake Sidecar is running, press Ctrl+C to shut down");
    let exit = supervisor.run(wait_for_shutdown_signal()).await;

    metrics_server.stop();
    if tokio::time::timeout(config.shutdown_timeout(), metrics_task)
        .await
        .is_err()
    {
        warn!("[metrics] server did not stop within the shutdown timeout");
    }

    exit
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // CLI args override the config file and environment
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_startup_banner(&config);

    if args.dry_run {
        info!("Dry run completed - configuration is valid");
        return Ok(());
    }

    match run(config).await {
        Ok(exit) => {
            info!("Quake Sidecar stopped: {:?}", exit);
            if exit.is_failure() {
                std::process::exit(exit.exit_code());
            }
            Ok(())
        }
        Err(e) => {
            error!("Quake Sidecar failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
