//! Core collector traits and types.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

use crate::storage::{MetricsPayload, NodeSpec, PayloadError, Sample};

/// Minimum allowed interval between rounds.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Errors that prevent the collector itself from running.
///
/// Per-node probe failures are never reported here; they become failed
/// samples instead.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}

/// Coarse classification of a probe failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum FailureKind {
    /// Unreachable, refused or timed out.
    Transport,
    /// Reachable, but the response was not a usable metrics document.
    Protocol,
}

/// Why one probe attempt failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The node's base address could not be turned into a connect target.
    #[error("invalid node address '{url}': {reason}")]
    InvalidAddress { url: String, reason: String },

    /// TCP connect failed (DNS, refused, unreachable).
    #[error("connect {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// TCP connect did not finish within its budget.
    #[error("connect {addr}: timed out after {}ms", .timeout.as_millis())]
    ConnectTimeout { addr: String, timeout: Duration },

    /// The metrics request failed below the HTTP layer.
    #[error("fetch: {0}")]
    Fetch(String),

    /// The metrics request did not finish within its budget.
    #[error("fetch: timed out after {}ms", .0.as_millis())]
    FetchTimeout(Duration),

    /// The agent answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The body was not a valid metrics document.
    #[error("decode: {0}")]
    Decode(String),

    /// The document decoded but its values are out of range.
    #[error("invalid metrics: {0}")]
    Invalid(#[from] PayloadError),

    /// The overall per-probe deadline expired.
    #[error("probe deadline of {}ms exceeded", .0.as_millis())]
    Deadline(Duration),

    /// The probe task panicked or was aborted.
    #[error("probe task failed: {0}")]
    Task(String),
}

impl ProbeError {
    /// Transport or protocol failure; both are stored the same way.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Status(_) | Self::Decode(_) | Self::Invalid(_) => FailureKind::Protocol,
            _ => FailureKind::Transport,
        }
    }
}

/// Result of one probe attempt, before it is stamped and stored.
#[derive(Debug)]
pub struct ProbeOutcome {
    /// Connect + fetch + decode time; zero for failures.
    pub latency_ms: u64,
    pub result: Result<MetricsPayload, ProbeError>,
}

impl ProbeOutcome {
    pub fn succeeded(latency_ms: u64, metrics: MetricsPayload) -> Self {
        Self {
            latency_ms,
            result: Ok(metrics),
        }
    }

    pub fn failed(error: ProbeError) -> Self {
        Self {
            latency_ms: 0,
            result: Err(error),
        }
    }

    /// Turn this outcome into an immutable sample for `node`.
    pub fn into_sample(self, time: DateTime<Utc>, node: Arc<NodeSpec>) -> Sample {
        match self.result {
            Ok(metrics) => Sample::success(time, node, self.latency_ms, metrics),
            Err(e) => Sample::failure(time, node, self.latency_ms, e.to_string()),
        }
    }
}

/// One reachability + fetch attempt against a single node.
///
/// # Contract
///
/// - Never panics or returns early with an error: every failure is folded
///   into the returned [`ProbeOutcome`].
/// - Returns within [`Probe::deadline`]. The collector enforces the same
///   deadline from the outside, so a misbehaving implementation cannot hold
///   a round open.
/// - Releases every connection it opened before returning.
#[async_trait::async_trait]
pub trait Probe: Send + Sync + 'static {
    /// Probe one node.
    async fn probe(&self, node: &NodeSpec) -> ProbeOutcome;

    /// Upper bound on a single [`Probe::probe`] call.
    fn deadline(&self) -> Duration;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind() {
        assert_eq!(ProbeError::Status(503).kind(), FailureKind::Protocol);
        assert_eq!(
            ProbeError::Decode("eof".to_string()).kind(),
            FailureKind::Protocol
        );
        let invalid = PayloadError::OutOfRange {
            field: "cpu_percent",
            value: 140.0,
        };
        assert_eq!(ProbeError::from(invalid).kind(), FailureKind::Protocol);
        assert_eq!(
            ProbeError::Deadline(Duration::from_secs(4)).kind(),
            FailureKind::Transport
        );
        assert_eq!(FailureKind::Transport.as_ref(), "transport");
    }

    #[test]
    fn test_error_messages() {
        let e = ProbeError::ConnectTimeout {
            addr: "10.0.0.1:80".to_string(),
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(e.to_string(), "connect 10.0.0.1:80: timed out after 1500ms");
        assert_eq!(
            ProbeError::Deadline(Duration::from_secs(4)).to_string(),
            "probe deadline of 4000ms exceeded"
        );
    }

    #[test]
    fn test_failed_outcome_into_sample() {
        let node = Arc::new(NodeSpec::new("a", "http://127.0.0.1:1"));
        let sample = ProbeOutcome::failed(ProbeError::Status(500)).into_sample(Utc::now(), node);

        assert_eq!(sample.error(), Some("unexpected HTTP status 500"));
        assert!(sample.metrics().is_none());
        assert_eq!(sample.latency_ms(), 0);
    }
}
