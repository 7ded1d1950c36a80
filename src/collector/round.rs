//! One collection round across every configured node.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::{Instant, timeout};

use crate::collector::{Probe, ProbeError, ProbeOutcome};
use crate::storage::{NodeSpec, Sample, SampleWriter};

/// What happened in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSummary {
    /// 1-based round counter.
    pub round: u64,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Probes every node concurrently and commits the outcomes.
///
/// A round returns only after every node's probe has finished or hit its
/// deadline, and all of its samples are committed together, so readers
/// never see half a round.
pub struct Collector {
    nodes: Vec<Arc<NodeSpec>>,
    probe: Arc<dyn Probe>,
    writer: SampleWriter,
    rounds: AtomicU64,
}

impl Collector {
    /// Create a collector for a fixed node set.
    pub fn new(
        nodes: impl IntoIterator<Item = NodeSpec>,
        probe: Arc<dyn Probe>,
        writer: SampleWriter,
    ) -> Self {
        Self {
            nodes: nodes.into_iter().map(Arc::new).collect(),
            probe,
            writer,
            rounds: AtomicU64::new(0),
        }
    }

    /// Configured nodes, in configuration order.
    pub fn nodes(&self) -> &[Arc<NodeSpec>] {
        &self.nodes
    }

    /// Number of rounds started so far.
    pub fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::Relaxed)
    }

    /// Run exactly one round.
    pub async fn run_round(&self) -> RoundSummary {
        let round = self.rounds.fetch_add(1, Ordering::Relaxed) + 1;
        let start = Instant::now();
        let deadline = self.probe.deadline();

        tracing::debug!(round, nodes = self.nodes.len(), "Starting probe round");

        let tasks = self.nodes.iter().map(|node| {
            let (probe, node) = (Arc::clone(&self.probe), Arc::clone(node));
            tokio::spawn(async move {
                timeout(deadline, probe.probe(&node))
                    .await
                    .unwrap_or_else(|_| ProbeOutcome::failed(ProbeError::Deadline(deadline)))
            })
        });
        let outcomes = join_all(tasks).await;

        let now = Utc::now();
        let samples: Vec<Sample> = self
            .nodes
            .iter()
            .zip(outcomes)
            .map(|(node, joined)| {
                let outcome = joined.unwrap_or_else(|e| {
                    ProbeOutcome::failed(ProbeError::Task(e.to_string()))
                });
                log_outcome(node, &outcome);
                outcome.into_sample(now, Arc::clone(node))
            })
            .collect();

        let succeeded = samples.iter().filter(|s| s.is_success()).count();
        let failed = samples.len() - succeeded;
        self.writer.commit_round(samples);

        let summary = RoundSummary {
            round,
            succeeded,
            failed,
            elapsed: start.elapsed(),
        };

        if failed > 0 {
            tracing::info!(
                round,
                succeeded,
                failed,
                elapsed_ms = summary.elapsed.as_millis(),
                "Probe round completed with failures"
            );
        } else {
            tracing::debug!(
                round,
                succeeded,
                elapsed_ms = summary.elapsed.as_millis(),
                "Probe round completed"
            );
        }

        summary
    }
}

fn log_outcome(node: &NodeSpec, outcome: &ProbeOutcome) {
    match &outcome.result {
        Ok(_) => {
            tracing::debug!(node = %node.name, url = %node.url, latency_ms = outcome.latency_ms, "Probe successful");
        }
        Err(e) => {
            tracing::warn!(node = %node.name, url = %node.url, kind = %e.kind(), error = %e, "Probe failed");
        }
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("nodes", &self.nodes.len())
            .field("rounds", &self.rounds())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::testing::FakeProbe;
    use crate::storage::{StorageBuilder, StorageHandles};

    fn setup(
        probe: FakeProbe,
        names: &[&str],
        history_limit: usize,
    ) -> (Collector, Arc<FakeProbe>, StorageHandles) {
        let handles = StorageBuilder::new().history_limit(history_limit).build();
        let probe = Arc::new(probe);
        let nodes = names
            .iter()
            .map(|n| NodeSpec::new(*n, format!("http://{n}:9876")));
        let collector = Collector::new(
            nodes,
            Arc::clone(&probe) as Arc<dyn Probe>,
            handles.writer.clone(),
        );
        (collector, probe, handles)
    }

    #[tokio::test]
    async fn test_history_keeps_last_rounds() {
        let (collector, _probe, handles) =
            setup(FakeProbe::new(Duration::from_secs(4)), &["solo"], 3);

        for _ in 0..5 {
            collector.run_round().await;
        }

        let rounds: Vec<u64> = handles
            .reader
            .history("solo")
            .iter()
            .map(|s| s.metrics().unwrap().uptime_sec)
            .collect();
        assert_eq!(rounds, vec![3, 4, 5]);
        assert_eq!(collector.rounds(), 5);
    }

    #[tokio::test]
    async fn test_failure_is_contained_to_its_node() {
        let probe = FakeProbe::new(Duration::from_secs(4)).with_failure("bad");
        let (collector, _probe, handles) = setup(probe, &["good", "bad"], 10);

        let summary = collector.run_round().await;
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);

        let good = handles.reader.history("good");
        assert_eq!(good.len(), 1);
        assert!(good[0].error().is_none());

        let bad = handles.reader.latest_for("bad").unwrap();
        assert!(bad.metrics().is_none());
        assert!(bad.error().unwrap().contains("connect"));
        assert_eq!(handles.reader.history("bad").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_node_bounded_by_deadline() {
        let deadline = Duration::from_millis(200);
        let probe = FakeProbe::new(deadline).with_delay("slow", Duration::from_secs(30));
        let (collector, _probe, handles) = setup(probe, &["fast", "slow"], 10);

        let summary = collector.run_round().await;

        assert!(summary.elapsed < Duration::from_secs(1), "{summary:?}");
        assert!(handles.reader.latest_for("fast").unwrap().is_success());

        let slow = handles.reader.latest_for("slow").unwrap();
        assert!(slow.error().unwrap().contains("deadline"));
    }

    #[tokio::test]
    async fn test_probes_run_in_parallel() {
        let delay = Duration::from_millis(100);
        let probe = FakeProbe::new(Duration::from_secs(4))
            .with_delay("a", delay)
            .with_delay("b", delay)
            .with_delay("c", delay);
        let (collector, probe, _handles) = setup(probe, &["a", "b", "c"], 10);

        collector.run_round().await;
        assert_eq!(probe.max_in_flight(), 3);
    }

    #[tokio::test]
    async fn test_round_samples_share_commit_time() {
        let (collector, _probe, handles) =
            setup(FakeProbe::new(Duration::from_secs(4)), &["a", "b"], 10);

        collector.run_round().await;
        let latest = handles.reader.latest();
        assert_eq!(latest["a"].time(), latest["b"].time());
        assert!(Arc::ptr_eq(latest["a"].node(), &collector.nodes()[0]));
    }

    #[tokio::test]
    async fn test_no_nodes_is_an_empty_round() {
        let (collector, probe, handles) = setup(FakeProbe::new(Duration::from_secs(4)), &[], 10);
        let summary = collector.run_round().await;
        assert_eq!(summary.succeeded + summary.failed, 0);
        assert_eq!(probe.total(), 0);
        assert!(handles.reader.latest().is_empty());
    }
}
