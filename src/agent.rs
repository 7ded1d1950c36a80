//! Node agent.
//!
//! The per-node metrics producer the collector probes. It samples the local
//! host on a fixed window and serves the latest sample as JSON.
//!
//! - [`NetRateEstimator`]: Byte counters to bytes/sec, state owned by the sampler
//! - [`HostSampler`]: CPU, memory, disk, uptime and network via `sysinfo`
//! - [`create_agent_router`]: `GET /metrics` and `GET /healthz`

mod rate;
mod sampler;
mod server;

use std::net::SocketAddr;

use thiserror::Error;

pub use rate::{MIN_RATE_WINDOW, NetRateEstimator};
pub use sampler::{HostSampler, MetricsSnapshot, start_sampling};
pub use server::create_agent_router;

/// Agent error types.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Could not bind the listen address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The blocking sampling task panicked or was cancelled.
    #[error("sampler task failed: {0}")]
    Sampler(#[from] tokio::task::JoinError),
}
