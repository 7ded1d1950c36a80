//! HTTP metrics probe.
//!
//! Measures TCP reachability of a node's agent, then fetches and decodes its
//! metrics document. Each step has its own budget and the whole attempt is
//! bounded by an overall deadline.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::collector::{CollectorError, Probe, ProbeError, ProbeOutcome};
use crate::storage::{MetricsPayload, NodeSpec};

/// Path appended to a node's base address for the metrics fetch.
pub const METRICS_PATH: &str = "/metrics";

/// Port used for the reachability check when the address has none.
const DEFAULT_CONNECT_PORT: u16 = 80;

/// Default TCP connect budget (1.5 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Default metrics fetch budget (3 seconds).
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Default overall per-probe deadline (4 seconds).
const DEFAULT_DEADLINE: Duration = Duration::from_secs(4);

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_fetch_timeout() -> Duration {
    DEFAULT_FETCH_TIMEOUT
}

fn default_deadline() -> Duration {
    DEFAULT_DEADLINE
}

/// Time budgets for one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTimings {
    /// TCP connect budget (default: 1.5s).
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Metrics request budget (default: 3s).
    #[serde(default = "default_fetch_timeout", with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// Overall deadline for connect + fetch + decode (default: 4s).
    #[serde(default = "default_deadline", with = "humantime_serde")]
    pub deadline: Duration,
}

impl Default for ProbeTimings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            deadline: DEFAULT_DEADLINE,
        }
    }
}

impl ProbeTimings {
    /// Set the TCP connect budget.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the metrics request budget.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the overall deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

/// `host:port` for the reachability check.
///
/// The port defaults to 80 when the address does not name one.
pub fn connect_target(base_url: &str) -> Result<String, ProbeError> {
    let invalid = |reason: String| ProbeError::InvalidAddress {
        url: base_url.to_string(),
        reason,
    };

    let url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host".to_string()))?;
    let port = url.port().unwrap_or(DEFAULT_CONNECT_PORT);

    Ok(format!("{host}:{port}"))
}

/// Metrics URL for a node: the configured base address plus [`METRICS_PATH`].
pub fn metrics_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), METRICS_PATH)
}

fn fetch_error(e: reqwest::Error, budget: Duration) -> ProbeError {
    if e.is_timeout() {
        ProbeError::FetchTimeout(budget)
    } else {
        ProbeError::Fetch(e.to_string())
    }
}

/// Probe that talks to a node agent over TCP + HTTP.
pub struct HttpProbe {
    client: Client,
    timings: ProbeTimings,
}

impl HttpProbe {
    /// Create a probe with the given budgets.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` if the HTTP client cannot be built.
    pub fn new(timings: ProbeTimings) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .timeout(timings.fetch_timeout)
            .build()
            .map_err(|e| CollectorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timings })
    }

    pub fn timings(&self) -> &ProbeTimings {
        &self.timings
    }

    async fn attempt(&self, node: &NodeSpec) -> Result<MetricsPayload, ProbeError> {
        let addr = connect_target(&node.url)?;

        // Reachability only; the stream is closed before the fetch starts.
        match timeout(self.timings.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => drop(stream),
            Ok(Err(source)) => return Err(ProbeError::Connect { addr, source }),
            Err(_) => {
                return Err(ProbeError::ConnectTimeout {
                    addr,
                    timeout: self.timings.connect_timeout,
                });
            }
        }

        let response = self
            .client
            .get(metrics_url(&node.url))
            .send()
            .await
            .map_err(|e| fetch_error(e, self.timings.fetch_timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e, self.timings.fetch_timeout))?;

        let metrics: MetricsPayload =
            serde_json::from_slice(&body).map_err(|e| ProbeError::Decode(e.to_string()))?;
        metrics.validate()?;

        Ok(metrics)
    }
}

impl std::fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProbe")
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, node: &NodeSpec) -> ProbeOutcome {
        let start = Instant::now();

        match timeout(self.timings.deadline, self.attempt(node)).await {
            Ok(Ok(metrics)) => {
                let latency_ms = start.elapsed().as_millis().min(u64::MAX as u128) as u64;
                ProbeOutcome::succeeded(latency_ms, metrics)
            }
            Ok(Err(e)) => ProbeOutcome::failed(e),
            Err(_) => ProbeOutcome::failed(ProbeError::Deadline(self.timings.deadline)),
        }
    }

    fn deadline(&self) -> Duration {
        self.timings.deadline
    }
}
