//! nodewatch-agent Binary Entry Point
//!
//! Samples the local host and serves the latest sample on `GET /metrics`.

use clap::Parser;
use nodewatch::agent::{AgentError, HostSampler, create_agent_router, start_sampling};
use nodewatch::config::AgentConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// nodewatch-agent - per-node metrics producer
#[derive(Parser, Debug)]
#[command(name = "nodewatch-agent", version, about, long_about = None)]
struct Cli {
    /// Path to agent configuration file
    #[arg(short, long, default_value = "agent.yaml", env = "NODEWATCH_AGENT_CONFIG")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,nodewatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let config = AgentConfig::load(&cli.config)?;
    let addr = config.socket_addr();

    let sampler = HostSampler::new(config.hostname_override.clone());
    tracing::info!(
        hostname = %sampler.hostname(),
        window = %humantime::format_duration(config.refresh_window()),
        "Starting host sampler"
    );
    let (snapshot, sampling) = start_sampling(sampler, config.refresh_window()).await?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| AgentError::Bind { addr, source })?;
    tracing::info!("Agent listening on: http://{}", addr);

    axum::serve(listener, create_agent_router(snapshot))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received Ctrl+C signal");
        })
        .await?;

    sampling.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}
