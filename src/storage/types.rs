//! Core data types for the storage layer.
//!
//! - [`NodeSpec`]: A monitored node as configured at startup
//! - [`AlertThresholds`] / [`Breach`]: Optional per-node ceilings and their violations
//! - [`MetricsPayload`]: The document a node's agent reports
//! - [`Sample`]: The immutable outcome of one probe attempt

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

fn default_group() -> String {
    "default".to_string()
}

/// A monitored node.
///
/// Loaded once at startup and shared by reference with every [`Sample`]
/// produced for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique node name.
    pub name: String,
    /// Base address of the node's agent (e.g. `http://10.0.0.5:9876`).
    pub url: String,
    /// Free-form group label used for filtering.
    #[serde(default = "default_group")]
    pub group: String,
    /// Optional alert ceilings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<AlertThresholds>,
}

impl NodeSpec {
    /// Create a node in the default group with no alerts.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            group: default_group(),
            alerts: None,
        }
    }

    /// Set the group label.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Set alert thresholds.
    pub fn with_alerts(mut self, alerts: AlertThresholds) -> Self {
        self.alerts = Some(alerts);
        self
    }
}

/// Alert ceilings for a node. Each one is independent; absent ceilings never fire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_bps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx_bps: Option<f64>,
}

/// Which ceiling a payload exceeded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BreachKind {
    CpuPct,
    MemPct,
    DiskPct,
    TxBps,
    RxBps,
}

/// A single threshold violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breach {
    pub kind: BreachKind,
    /// Observed value.
    pub value: f64,
    /// Configured ceiling.
    pub limit: f64,
    /// Mountpoint for disk breaches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<String>,
}

impl AlertThresholds {
    /// Compare a payload against every configured ceiling.
    ///
    /// A value equal to its ceiling is not a breach.
    pub fn breaches(&self, metrics: &MetricsPayload) -> Vec<Breach> {
        let mut out = Vec::new();

        let mut check = |kind, value: f64, limit: Option<f64>, mountpoint: Option<&str>| {
            if let Some(limit) = limit
                && value > limit
            {
                out.push(Breach {
                    kind,
                    value,
                    limit,
                    mountpoint: mountpoint.map(str::to_owned),
                });
            }
        };

        check(BreachKind::CpuPct, metrics.cpu_percent, self.cpu_pct, None);
        check(BreachKind::MemPct, metrics.mem_percent, self.mem_pct, None);
        for disk in &metrics.disks {
            check(
                BreachKind::DiskPct,
                disk.used_pct,
                self.disk_pct,
                Some(disk.mountpoint.as_str()),
            );
        }
        check(BreachKind::TxBps, metrics.net.tx_bytes_per_sec, self.tx_bps, None);
        check(BreachKind::RxBps, metrics.net.rx_bytes_per_sec, self.rx_bps, None);

        out
    }
}

/// Usage of one mounted filesystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub mountpoint: String,
    pub used_pct: f64,
    pub total_bytes: u64,
    pub used_bytes: u64,
}

/// Network throughput estimate over the agent's own sampling window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetThroughput {
    pub tx_bytes_per_sec: f64,
    pub rx_bytes_per_sec: f64,
}

/// Metrics document reported by a node's agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsPayload {
    pub hostname: String,
    /// Agent-side sampling time (RFC 3339, UTC).
    #[serde(rename = "timestamp_iso")]
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub uptime_sec: u64,
    #[serde(default)]
    pub disks: Vec<DiskUsage>,
    #[serde(default)]
    pub net: NetThroughput,
}

/// A metrics document that decoded but violates its value ranges.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("duplicate mountpoint: {0}")]
    DuplicateMountpoint(String),

    #[error("{field} must be a finite non-negative rate: {value}")]
    InvalidRate { field: &'static str, value: f64 },
}

impl MetricsPayload {
    /// Check the value ranges a well-behaved agent guarantees.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), PayloadError> {
        fn percent(field: &'static str, value: f64) -> Result<(), PayloadError> {
            if (0.0..=100.0).contains(&value) {
                Ok(())
            } else {
                Err(PayloadError::OutOfRange { field, value })
            }
        }

        percent("cpu_percent", self.cpu_percent)?;
        percent("mem_percent", self.mem_percent)?;

        let mut mounts = HashSet::new();
        for disk in &self.disks {
            if !mounts.insert(disk.mountpoint.as_str()) {
                return Err(PayloadError::DuplicateMountpoint(disk.mountpoint.clone()));
            }
            percent("disk used_pct", disk.used_pct)?;
        }

        for (field, value) in [
            ("tx_bytes_per_sec", self.net.tx_bytes_per_sec),
            ("rx_bytes_per_sec", self.net.rx_bytes_per_sec),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PayloadError::InvalidRate { field, value });
            }
        }

        Ok(())
    }
}

/// Up/down classification of a sample, with `alert` for reachable nodes over a ceiling.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeStatus {
    Up,
    Alert,
    Down,
}

/// The record of one probe attempt.
///
/// Exactly one of `metrics` / `error` is present. Constructed only through
/// [`Sample::success`] and [`Sample::failure`]; decoding rejects documents
/// with both or neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSample")]
pub struct Sample {
    time: DateTime<Utc>,
    node: Arc<NodeSpec>,
    latency_ms: u64,
    #[serde(default, rename = "agent", skip_serializing_if = "Option::is_none")]
    metrics: Option<MetricsPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Wire shape of [`Sample`] before the metrics/error check.
#[derive(Deserialize)]
struct RawSample {
    time: DateTime<Utc>,
    node: Arc<NodeSpec>,
    latency_ms: u64,
    #[serde(default, rename = "agent")]
    metrics: Option<MetricsPayload>,
    #[serde(default)]
    error: Option<String>,
}

impl TryFrom<RawSample> for Sample {
    type Error = String;

    fn try_from(raw: RawSample) -> Result<Self, Self::Error> {
        match (raw.metrics, raw.error) {
            (Some(metrics), None) => Ok(Self::success(raw.time, raw.node, raw.latency_ms, metrics)),
            (None, Some(error)) => Ok(Self::failure(raw.time, raw.node, raw.latency_ms, error)),
            (Some(_), Some(_)) => Err("sample has both `agent` and `error`".to_string()),
            (None, None) => Err("sample has neither `agent` nor `error`".to_string()),
        }
    }
}

impl Sample {
    /// A successful probe.
    pub fn success(
        time: DateTime<Utc>,
        node: Arc<NodeSpec>,
        latency_ms: u64,
        metrics: MetricsPayload,
    ) -> Self {
        Self {
            time,
            node,
            latency_ms,
            metrics: Some(metrics),
            error: None,
        }
    }

    /// A failed probe.
    pub fn failure(
        time: DateTime<Utc>,
        node: Arc<NodeSpec>,
        latency_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            time,
            node,
            latency_ms,
            metrics: None,
            error: Some(error.into()),
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn node(&self) -> &Arc<NodeSpec> {
        &self.node
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    pub fn metrics(&self) -> Option<&MetricsPayload> {
        self.metrics.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Threshold violations of this sample; empty for failures or nodes without alerts.
    pub fn breaches(&self) -> Vec<Breach> {
        match (&self.metrics, &self.node.alerts) {
            (Some(metrics), Some(alerts)) => alerts.breaches(metrics),
            _ => Vec::new(),
        }
    }

    /// Classify this sample.
    pub fn status(&self) -> NodeStatus {
        if !self.is_success() {
            NodeStatus::Down
        } else if self.breaches().is_empty() {
            NodeStatus::Up
        } else {
            NodeStatus::Alert
        }
    }
}
