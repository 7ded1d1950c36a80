//! Storage Layer
//!
//! Bounded in-memory time series of probe samples, one history per node.
//! Nothing is persisted; the whole store is dropped on exit.
//!
//! # Components
//!
//! - [`SampleWriter`]: Commit facade used by the collector
//! - [`SampleReader`]: Snapshot facade used by queries and exports
//! - [`StorageBuilder`] / [`StorageHandles`]: Initialization

mod builder;
mod facades;
mod store;
mod types;

pub use builder::{DEFAULT_HISTORY_LIMIT, StorageBuilder, StorageHandles};
pub use facades::{SampleReader, SampleWriter};
pub use store::SampleStore;
pub use types::{
    AlertThresholds, Breach, BreachKind, DiskUsage, MetricsPayload, NetThroughput, NodeSpec,
    NodeStatus, PayloadError, Sample,
};
