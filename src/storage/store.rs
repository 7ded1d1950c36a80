//! In-memory sample store.
//!
//! One coarse [`RwLock`] guards both the per-node history and the latest
//! index. Node counts are in the tens and writes happen once per round, so
//! a single lock keeps every read a consistent snapshot without per-key
//! coordination. `parking_lot`'s lock is eventually fair, so a steady stream
//! of readers cannot starve the collector's commit.
//!
//! Critical sections only touch in-memory maps and clone `Arc`s; no I/O or
//! serialization happens while the lock is held.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::storage::Sample;

/// Per-node history plus latest index.
#[derive(Debug, Default)]
struct StoreState {
    history: HashMap<String, VecDeque<Arc<Sample>>>,
    latest: HashMap<String, Arc<Sample>>,
}

impl StoreState {
    fn append(&mut self, node: &str, sample: Arc<Sample>, limit: usize) {
        let history = self.history.entry(node.to_owned()).or_default();
        history.push_back(Arc::clone(&sample));
        while history.len() > limit {
            history.pop_front();
        }
        self.latest.insert(node.to_owned(), sample);
    }
}

/// Bounded, thread-safe per-node sample history.
#[derive(Debug)]
pub struct SampleStore {
    state: RwLock<StoreState>,
    history_limit: usize,
}

impl SampleStore {
    /// Create an empty store keeping at most `history_limit` samples per node.
    ///
    /// A limit of zero is raised to one so the latest index always has a
    /// matching history entry.
    pub fn new(history_limit: usize) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            history_limit: history_limit.max(1),
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Append one sample to `node`'s history and make it the node's latest.
    pub fn commit(&self, node: &str, sample: Arc<Sample>) {
        self.state.write().append(node, sample, self.history_limit);
    }

    /// Append a batch of samples under a single write lock.
    ///
    /// Readers observe either none or all of the batch.
    pub fn commit_batch<I>(&self, samples: I)
    where
        I: IntoIterator<Item = Arc<Sample>>,
    {
        let mut state = self.state.write();
        for sample in samples {
            let name = sample.node().name.clone();
            state.append(&name, sample, self.history_limit);
        }
    }

    /// Snapshot of the latest sample per node that has produced one.
    pub fn latest(&self) -> HashMap<String, Arc<Sample>> {
        self.state.read().latest.clone()
    }

    /// Latest sample of one node.
    pub fn latest_for(&self, node: &str) -> Option<Arc<Sample>> {
        self.state.read().latest.get(node).cloned()
    }

    /// History of one node, oldest first. Unknown nodes yield an empty list.
    pub fn history(&self, node: &str) -> Vec<Arc<Sample>> {
        self.state
            .read()
            .history
            .get(node)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// History of every node, keyed by node name.
    pub fn history_all(&self) -> BTreeMap<String, Vec<Arc<Sample>>> {
        self.state
            .read()
            .history
            .iter()
            .map(|(name, h)| (name.clone(), h.iter().cloned().collect()))
            .collect()
    }

    /// Number of samples currently retained for `node`.
    pub fn len(&self, node: &str) -> usize {
        self.state.read().history.get(node).map_or(0, VecDeque::len)
    }

    /// True when no sample has ever been committed.
    pub fn is_empty(&self) -> bool {
        self.state.read().latest.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NodeSpec;
    use chrono::{Duration, Utc};

    fn node(name: &str) -> Arc<NodeSpec> {
        Arc::new(NodeSpec::new(name, "http://127.0.0.1:9876"))
    }

    fn failed(node: &Arc<NodeSpec>, latency_ms: u64) -> Arc<Sample> {
        Arc::new(Sample::failure(
            Utc::now(),
            Arc::clone(node),
            latency_ms,
            "down",
        ))
    }

    #[test]
    fn test_history_is_bounded_fifo() {
        let store = SampleStore::new(3);
        let n = node("a");

        for round in 1..=5 {
            store.commit("a", failed(&n, round));
        }

        let rounds: Vec<u64> = store.history("a").iter().map(|s| s.latency_ms()).collect();
        assert_eq!(rounds, vec![3, 4, 5]);
        assert_eq!(store.len("a"), 3);
    }

    #[test]
    fn test_latest_is_same_object_as_history_tail() {
        let store = SampleStore::new(2);
        let n = node("a");

        for round in 0..4 {
            store.commit("a", failed(&n, round));
            let latest = store.latest_for("a").unwrap();
            let history = store.history("a");
            assert!(Arc::ptr_eq(&latest, history.last().unwrap()));
        }
    }

    #[test]
    fn test_unknown_node_is_empty() {
        let store = SampleStore::new(10);
        assert!(store.is_empty());
        assert!(store.history("ghost").is_empty());
        assert!(store.latest_for("ghost").is_none());
        assert!(store.latest().is_empty());
    }

    #[test]
    fn test_commit_batch_spans_nodes() {
        let store = SampleStore::new(10);
        let (a, b) = (node("a"), node("b"));
        store.commit_batch(vec![failed(&a, 1), failed(&b, 2)]);

        let all = store.history_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all["a"].len(), 1);
        assert_eq!(store.latest()["b"].latency_ms(), 2);
    }

    #[test]
    fn test_zero_limit_keeps_latest() {
        let store = SampleStore::new(0);
        let n = node("a");
        store.commit("a", failed(&n, 1));
        assert_eq!(store.history_limit(), 1);
        assert_eq!(store.len("a"), 1);
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let store = SampleStore::new(10);
        let n = node("a");
        let base = Utc::now();
        for i in 0..5 {
            let s = Sample::failure(base + Duration::seconds(i), Arc::clone(&n), 0, "x");
            store.commit("a", Arc::new(s));
        }
        let history = store.history("a");
        assert!(history.windows(2).all(|w| w[0].time() <= w[1].time()));
    }

    #[test]
    fn test_concurrent_readers_see_consistent_snapshots() {
        let store = Arc::new(SampleStore::new(4));
        let n = node("a");

        let writer = {
            let store = Arc::clone(&store);
            let n = Arc::clone(&n);
            std::thread::spawn(move || {
                for i in 0..2_000 {
                    store.commit("a", failed(&n, i));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let mut last_len = 0;
                    for _ in 0..2_000 {
                        let history = store.history("a");
                        assert!(history.len() <= 4);
                        assert!(history.len() >= last_len);
                        last_len = history.len();
                        assert!(history.windows(2).all(|w| w[0].latency_ms() < w[1].latency_ms()));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(store.latest_for("a").unwrap().latency_ms(), 1_999);
    }
}
