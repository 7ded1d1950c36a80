//! nodewatch Binary Entry Point
//!
//! Runs the collector and the query/export web server.
//! Core functionality is provided by the `nodewatch` library crate.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use nodewatch::{
    collector::{Collector, HttpProbe, Scheduler},
    config::AppConfig,
    server::{AppState, create_router},
    storage::StorageBuilder,
};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// nodewatch - fleet metrics collector
#[derive(Parser, Debug)]
#[command(name = "nodewatch", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "nodewatch.yaml", env = "NODEWATCH_CONFIG")]
    config: String,

    /// Server listen address (overrides config file)
    #[arg(long, env = "NODEWATCH_LISTEN")]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,nodewatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let config = AppConfig::load(&cli.config)?;
    let addr = cli.listen.unwrap_or_else(|| config.socket_addr());
    let interval = config.refresh_interval();

    tracing::info!(
        nodes = config.nodes.len(),
        history_limit = config.history_capacity(),
        refresh = %humantime::format_duration(interval),
        deadline = %humantime::format_duration(config.probe.deadline),
        "Configuration loaded"
    );
    if config.nodes.is_empty() {
        tracing::warn!("No nodes configured; queries will return empty results");
    }

    let handles = StorageBuilder::new()
        .history_limit(config.history_capacity())
        .build();

    let probe = Arc::new(HttpProbe::new(config.probe)?);
    let collector = Arc::new(Collector::new(
        config.nodes.iter().cloned(),
        probe,
        handles.writer.clone(),
    ));

    // First round completes before the server accepts queries.
    let (first, scheduler) = Scheduler::new(Arc::clone(&collector), interval)
        .start()
        .await;
    tracing::info!(
        succeeded = first.succeeded,
        failed = first.failed,
        elapsed_ms = first.elapsed.as_millis(),
        "Initial round committed"
    );

    let app = create_router(AppState::new(
        handles.reader.clone(),
        collector.nodes().iter().cloned(),
    ));

    tracing::info!("Web server listening on: http://{}", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(scheduler))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then stop the scheduler.
async fn shutdown_signal(scheduler: JoinHandle<()>) {
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

    tracing::info!("Stopping scheduler...");
    scheduler.abort();
}
