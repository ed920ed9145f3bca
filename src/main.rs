//! Joki Binary Entry Point
//!
//! Loads the YAML configuration, starts one fping worker per probe profile
//! and runs until Ctrl+C or SIGTERM.

use std::sync::Arc;

use clap::Parser;
use joki::{
    config::{AppConfig, locate_binary},
    orchestrator::{Orchestrator, RunningWorkers},
    probe::FpingLauncher,
    sink::{BatchDispatcher, connect_sink, local_hostname},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Joki - fping latency collector
#[derive(Parser, Debug)]
#[command(name = "joki", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "JOKI_CONFIG"
    )]
    config: String,

    /// Enable debug output (overrides config file)
    #[arg(short, long, env = "JOKI_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from file
    let mut config = AppConfig::load(&cli.config)?;
    if cli.debug {
        config.debug = true;
    }

    // Initialize tracing
    let default_filter = if config.debug {
        "info,joki=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Joki - fping latency collector");
    tracing::info!("Loaded configuration from: {}", cli.config);

    let fping = locate_binary(&config.fping.binary)?;
    tracing::info!("Using fping at: {}", fping.display());

    let registry = Arc::new(config.registry()?);
    tracing::info!(
        "Registry: {} profiles, {} targets",
        registry.profiles().count(),
        registry.targets().count()
    );

    let sink = connect_sink(&config.influxdb).await?;
    tracing::info!(
        "InfluxDB sink: {} ({}), database '{}', measurement '{}'",
        config.influxdb.address(),
        config.influxdb.transport,
        config.influxdb.db,
        config.influxdb.measurement,
    );

    let dispatcher = BatchDispatcher::new(
        sink,
        config.influxdb.measurement.as_str(),
        local_hostname(),
    );

    let config = Arc::new(config);
    let running = Orchestrator::new(
        Arc::clone(&config),
        registry,
        Arc::new(FpingLauncher::new(fping)),
        dispatcher,
    )
    .start();

    if running.is_empty() {
        tracing::warn!("No probe profile has targets, nothing to do");
    }
    tracing::info!("Press Ctrl+C to shutdown");

    shutdown_signal(running).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then stop every worker.
async fn shutdown_signal(mut running: RunningWorkers) -> std::io::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let mut term =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    #[cfg(unix)]
    let terminate = term.recv();

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
        _ = running.join() => {
            tracing::error!("All workers exited");
        }
    }

    tracing::info!("Shutting down workers...");
    running.shutdown().await;
    Ok(())
}
