//! nodewatch - Fleet Metrics Collector
//!
//! This crate provides the core of the nodewatch monitoring system. It can be
//! used as a library, or run as the `nodewatch` (collector + query server) and
//! `nodewatch-agent` (per-node metrics producer) executables.
//!
//! # Architecture
//!
//! - **Collector**: Concurrent probe rounds over a fixed node set, driven by a scheduler
//! - **Storage**: Bounded in-memory history and latest sample per node
//! - **Export**: CSV and JSON views of the history
//! - **Server**: Read-only REST API over the store
//! - **Agent**: Host sampler serving the metrics document nodes report
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nodewatch::{AppConfig, AppState, Collector, HttpProbe, Scheduler, StorageBuilder, create_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load("nodewatch.yaml")?;
//!     let handles = StorageBuilder::new().history_limit(config.history_capacity()).build();
//!
//!     let probe = Arc::new(HttpProbe::new(config.probe)?);
//!     let collector = Arc::new(Collector::new(config.nodes.clone(), probe, handles.writer.clone()));
//!     let (_first, _task) = Scheduler::new(Arc::clone(&collector), config.refresh_interval())
//!         .start()
//!         .await;
//!
//!     let app = create_router(AppState::new(handles.reader.clone(), collector.nodes().to_vec()));
//!     let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod collector;
pub mod config;
pub mod export;
pub mod server;
pub mod storage;

pub use collector::{Collector, HttpProbe, Probe, ProbeError, ProbeTimings, Scheduler};
pub use config::{AppConfig, ConfigError};
pub use server::{AppState, create_router};
pub use storage::{
    MetricsPayload, NodeSpec, NodeStatus, Sample, SampleReader, SampleWriter, StorageBuilder,
    StorageHandles,
};
