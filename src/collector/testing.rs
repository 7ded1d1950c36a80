//! Test doubles shared by collector, scheduler and server tests.

use std::collections::{HashMap, HashSet};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;

use crate::collector::{Probe, ProbeError, ProbeOutcome};
use crate::storage::{DiskUsage, MetricsPayload, NetThroughput, NodeSpec};

/// A healthy payload; `uptime_sec` doubles as a marker so tests can tell rounds apart.
pub(crate) fn payload(hostname: &str, uptime_sec: u64) -> MetricsPayload {
    MetricsPayload {
        hostname: hostname.to_string(),
        timestamp: Utc::now(),
        cpu_percent: 12.345,
        mem_percent: 48.5,
        uptime_sec,
        disks: vec![DiskUsage {
            mountpoint: "/".to_string(),
            used_pct: 40.0,
            total_bytes: 1_000,
            used_bytes: 400,
        }],
        net: NetThroughput {
            tx_bytes_per_sec: 1_234.5,
            rx_bytes_per_sec: 6_789.25,
        },
    }
}

/// Scriptable in-process probe.
///
/// Succeeds unless the node is listed in `failing`, sleeps for the node's
/// entry in `delays`, and stamps each success with a per-node call counter.
pub(crate) struct FakeProbe {
    deadline: Duration,
    delays: HashMap<String, Duration>,
    failing: HashSet<String>,
    calls: Mutex<HashMap<String, u64>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    total: AtomicU64,
}

impl FakeProbe {
    pub(crate) fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            delays: HashMap::new(),
            failing: HashSet::new(),
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            total: AtomicU64::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, node: &str, delay: Duration) -> Self {
        self.delays.insert(node.to_string(), delay);
        self
    }

    pub(crate) fn with_failure(mut self, node: &str) -> Self {
        self.failing.insert(node.to_string());
        self
    }

    /// Number of probes started for `node`.
    pub(crate) fn calls(&self, node: &str) -> u64 {
        self.calls.lock().get(node).copied().unwrap_or(0)
    }

    /// Highest number of probes that were running at the same time.
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Probe for FakeProbe {
    async fn probe(&self, node: &NodeSpec) -> ProbeOutcome {
        let call = {
            let mut calls = self.calls.lock();
            let n = calls.entry(node.name.clone()).or_insert(0);
            *n += 1;
            *n
        };
        self.total.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&node.name) {
            tokio::time::sleep(*delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&node.name) {
            ProbeOutcome::failed(ProbeError::Connect {
                addr: format!("{}:80", node.name),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            })
        } else {
            ProbeOutcome::succeeded(5, payload(&node.name, call))
        }
    }

    fn deadline(&self) -> Duration {
        self.deadline
    }
}
