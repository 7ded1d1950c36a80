//! User-facing storage facades.
//!
//! - `SampleWriter`: Commit path used by the collector
//! - `SampleReader`: Read-only snapshots used by the query/export surface

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::storage::Sample;
use crate::storage::store::SampleStore;

// =============================================================================
// Writer
// =============================================================================

/// Commit handle for probe outcomes.
#[derive(Clone)]
pub struct SampleWriter {
    store: Arc<SampleStore>,
}

impl std::fmt::Debug for SampleWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleWriter").finish_non_exhaustive()
    }
}

impl SampleWriter {
    pub(crate) fn new(store: Arc<SampleStore>) -> Self {
        Self { store }
    }

    /// Commit a single sample under its node's name.
    pub fn commit(&self, sample: Sample) -> Arc<Sample> {
        let sample = Arc::new(sample);
        let name = sample.node().name.clone();
        self.store.commit(&name, Arc::clone(&sample));
        sample
    }

    /// Commit every sample of a round at once.
    pub fn commit_round(&self, samples: Vec<Sample>) {
        self.store.commit_batch(samples.into_iter().map(Arc::new));
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Read-only view over the store.
#[derive(Clone)]
pub struct SampleReader {
    store: Arc<SampleStore>,
}

impl std::fmt::Debug for SampleReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleReader")
            .field("history_limit", &self.store.history_limit())
            .finish_non_exhaustive()
    }
}

impl SampleReader {
    pub(crate) fn new(store: Arc<SampleStore>) -> Self {
        Self { store }
    }

    /// Latest sample per node that has produced at least one.
    pub fn latest(&self) -> HashMap<String, Arc<Sample>> {
        self.store.latest()
    }

    /// Latest sample of one node.
    pub fn latest_for(&self, node: &str) -> Option<Arc<Sample>> {
        self.store.latest_for(node)
    }

    /// One node's history, oldest first.
    pub fn history(&self, node: &str) -> Vec<Arc<Sample>> {
        self.store.history(node)
    }

    /// Every node's history.
    pub fn history_all(&self) -> BTreeMap<String, Vec<Arc<Sample>>> {
        self.store.history_all()
    }

    /// Configured per-node retention.
    pub fn history_limit(&self) -> usize {
        self.store.history_limit()
    }
}
