//! plugscope binary entry point
//!
//! Loads the configuration and serves the exporter endpoints.
//! Core functionality is provided by the `plugscope` library crate.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use plugscope::{
    cache::StatusCache,
    config::AppConfig,
    device::DeviceConfig,
    server::{AppState, create_router},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// plugscope - smart plug metrics exporter
#[derive(Parser, Debug)]
#[command(name = "plugscope", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "PLUGSCOPE_CONFIG"
    )]
    config: String,

    /// Server bind address (overrides config file)
    #[arg(long, env = "PLUGSCOPE_SERVER_BIND")]
    server_bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "PLUGSCOPE_SERVER_PORT")]
    server_port: Option<u16>,

    /// Per-target scrape timeout, e.g. "10s" (overrides config file)
    #[arg(long, env = "PLUGSCOPE_SCRAPE_TIMEOUT", value_parser = humantime::parse_duration)]
    scrape_timeout: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,plugscope=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("plugscope - smart plug metrics exporter");

    let cli = Cli::parse();

    tracing::info!(path = %cli.config, "Loading configuration");
    let mut config = AppConfig::read(&cli.config)?;

    // CLI > ENV > config file
    config.apply_overrides(cli.server_bind, cli.server_port, cli.scrape_timeout);
    config.validate()?;

    tracing::info!(
        targets = config.targets.targets.len(),
        timeout = ?config.probe.timeout,
        scrape_timeout = ?config.probe.scrape_timeout,
        config_cache_ttl = ?config.probe.config_cache_ttl,
        auth = config.probe.auth.is_some(),
        "Probe settings"
    );

    let state = AppState::from_config(&config)?;
    let janitor = spawn_cache_janitor(state.cache.clone(), config.probe.config_cache_ttl);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    tracing::info!("Listening on: http://{}", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(janitor) = janitor {
        janitor.abort();
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Periodically drop expired configuration documents of removed or silent targets.
fn spawn_cache_janitor(
    cache: Arc<StatusCache<DeviceConfig>>,
    ttl: Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    if ttl.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(ttl);
        loop {
            interval.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = cache.len(), "Purged expired cache entries");
            }
        }
    }))
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
