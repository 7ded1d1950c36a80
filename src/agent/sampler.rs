//! Host metrics via `sysinfo`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;
use sysinfo::{Disks, MINIMUM_CPU_UPDATE_INTERVAL, Networks, System};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};

use crate::agent::{AgentError, NetRateEstimator};
use crate::storage::{DiskUsage, MetricsPayload};

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        (part / whole * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn is_loopback(name: &str) -> bool {
    name == "lo" || name.to_lowercase().starts_with("loopback")
}

/// Reads local resource usage.
///
/// CPU usage is measured between two consecutive [`HostSampler::sample`]
/// calls, so the sampler is meant to be kept alive and sampled periodically.
pub struct HostSampler {
    system: System,
    disks: Disks,
    networks: Networks,
    rates: NetRateEstimator,
    hostname_override: Option<String>,
}

impl HostSampler {
    pub fn new(hostname_override: Option<String>) -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();

        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            rates: NetRateEstimator::new(),
            hostname_override,
        }
    }

    pub fn hostname(&self) -> String {
        self.hostname_override
            .clone()
            .or_else(System::host_name)
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Take one sample.
    pub fn sample(&mut self) -> MetricsPayload {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        self.disks.refresh_list();
        self.networks.refresh();

        let cpu = f64::from(self.system.global_cpu_usage());
        let cpu_percent = if cpu.is_finite() {
            cpu.clamp(0.0, 100.0)
        } else {
            0.0
        };

        let mem_percent = percent(
            self.system.used_memory() as f64,
            self.system.total_memory() as f64,
        );

        let (tx_total, rx_total) = self
            .networks
            .iter()
            .filter(|(name, _)| !is_loopback(name))
            .fold((0u64, 0u64), |(tx, rx), (_, data)| {
                (
                    tx.saturating_add(data.total_transmitted()),
                    rx.saturating_add(data.total_received()),
                )
            });

        MetricsPayload {
            hostname: self.hostname(),
            timestamp: Utc::now(),
            cpu_percent,
            mem_percent,
            uptime_sec: System::uptime(),
            disks: self.disk_usage(),
            net: self.rates.observe(tx_total, rx_total, Instant::now()),
        }
    }

    fn disk_usage(&self) -> Vec<DiskUsage> {
        let mut seen = HashSet::new();

        self.disks
            .iter()
            .filter(|d| d.total_space() > 0)
            .filter_map(|d| {
                let mountpoint = d.mount_point().to_string_lossy().into_owned();
                if mountpoint.is_empty() || !seen.insert(mountpoint.clone()) {
                    return None;
                }
                let total_bytes = d.total_space();
                let used_bytes = total_bytes.saturating_sub(d.available_space());
                Some(DiskUsage {
                    mountpoint,
                    used_pct: percent(used_bytes as f64, total_bytes as f64),
                    total_bytes,
                    used_bytes,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for HostSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSampler")
            .field("hostname_override", &self.hostname_override)
            .finish_non_exhaustive()
    }
}

/// The most recent host sample, shared between the sampling task and HTTP handlers.
#[derive(Clone)]
pub struct MetricsSnapshot {
    inner: Arc<RwLock<MetricsPayload>>,
}

impl MetricsSnapshot {
    pub fn new(initial: MetricsPayload) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn get(&self) -> MetricsPayload {
        self.inner.read().clone()
    }

    pub fn set(&self, payload: MetricsPayload) {
        *self.inner.write() = payload;
    }
}

/// Take a first sample, then refresh the snapshot every `window` in the background.
///
/// # Errors
/// Returns `AgentError::Sampler` if the initial blocking sample panics.
pub async fn start_sampling(
    mut sampler: HostSampler,
    window: Duration,
) -> Result<(MetricsSnapshot, JoinHandle<()>), AgentError> {
    tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
    let (first, sampler) = tokio::task::spawn_blocking(move || {
        let payload = sampler.sample();
        (payload, sampler)
    })
    .await?;

    let snapshot = MetricsSnapshot::new(first);
    let handle = tokio::spawn(run_sampler(sampler, snapshot.clone(), window));
    Ok((snapshot, handle))
}

async fn run_sampler(mut sampler: HostSampler, snapshot: MetricsSnapshot, window: Duration) {
    let mut ticker = interval_at(tokio::time::Instant::now() + window, window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let joined = tokio::task::spawn_blocking(move || {
            let payload = sampler.sample();
            (payload, sampler)
        })
        .await;

        match joined {
            Ok((payload, returned)) => {
                tracing::debug!(
                    cpu_percent = payload.cpu_percent,
                    mem_percent = payload.mem_percent,
                    "Host sampled"
                );
                snapshot.set(payload);
                sampler = returned;
            }
            Err(e) => {
                tracing::error!(error = %AgentError::from(e), "Host sampling stopped");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(25.0, 100.0), 25.0);
        assert_eq!(percent(1.0, 0.0), 0.0);
        assert_eq!(percent(200.0, 100.0), 100.0);
    }

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback("lo"));
        assert!(is_loopback("Loopback Pseudo-Interface 1"));
        assert!(!is_loopback("eth0"));
        assert!(!is_loopback("lowpan0"));
    }

    #[test]
    fn test_sample_is_valid_payload() {
        let mut sampler = HostSampler::new(Some("edge-7".to_string()));
        std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);

        let first = sampler.sample();
        assert_eq!(first.hostname, "edge-7");
        assert_eq!(first.net.tx_bytes_per_sec, 0.0);
        assert!(first.validate().is_ok(), "{:?}", first.validate());

        let second = sampler.sample();
        assert!(second.validate().is_ok(), "{:?}", second.validate());
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn test_snapshot_set_get() {
        let mut sampler = HostSampler::new(None);
        let payload = sampler.sample();
        let snapshot = MetricsSnapshot::new(payload.clone());
        assert_eq!(snapshot.get(), payload);

        let mut next = payload;
        next.uptime_sec += 1;
        snapshot.set(next.clone());
        assert_eq!(snapshot.get(), next);
    }
}
