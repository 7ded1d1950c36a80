//! Collector Layer
//!
//! Periodically probes every configured node and commits the outcomes to
//! storage.
//!
//! # Architecture
//!
//! - [`Probe`]: One reachability + metrics fetch attempt against a node
//! - [`HttpProbe`]: The TCP + HTTP implementation used in production
//! - [`Collector`]: One concurrent round across all nodes
//! - [`Scheduler`]: Drives rounds at a fixed interval without overlap
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use nodewatch::{Collector, HttpProbe, NodeSpec, ProbeTimings, Scheduler, StorageBuilder};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let handles = StorageBuilder::new().history_limit(500).build();
//! let probe = Arc::new(HttpProbe::new(ProbeTimings::default())?);
//! let nodes = vec![NodeSpec::new("web-1", "http://10.0.0.5:9876")];
//! let collector = Arc::new(Collector::new(nodes, probe, handles.writer.clone()));
//! let (_first, _task) = Scheduler::new(collector, Duration::from_secs(2)).start().await;
//! # Ok(())
//! # }
//! ```

mod probe;
mod round;
mod scheduler;
#[cfg(test)]
pub(crate) mod testing;
pub(crate) mod traits;

pub use probe::{HttpProbe, METRICS_PATH, ProbeTimings, connect_target, metrics_url};
pub use round::{Collector, RoundSummary};
pub use scheduler::Scheduler;
pub use traits::{CollectorError, FailureKind, MIN_INTERVAL, Probe, ProbeError, ProbeOutcome};
