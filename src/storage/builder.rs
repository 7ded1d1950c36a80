//! Storage builder and handles.
//!
//! Provides a builder pattern for constructing the storage layer
//! and a handles struct for accessing its facades.

use std::sync::Arc;

use crate::storage::store::SampleStore;
use crate::storage::{SampleReader, SampleWriter};

/// Default per-node history length.
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

/// Builder for constructing the storage layer.
#[derive(Debug, Clone)]
pub struct StorageBuilder {
    history_limit: usize,
}

impl Default for StorageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBuilder {
    /// Create a new storage builder with the default history limit.
    pub fn new() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Set the maximum number of samples retained per node.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Build the storage layer and return handles.
    pub fn build(self) -> StorageHandles {
        let store = Arc::new(SampleStore::new(self.history_limit));

        tracing::debug!(history_limit = store.history_limit(), "Sample store ready");

        StorageHandles {
            writer: SampleWriter::new(Arc::clone(&store)),
            reader: SampleReader::new(store),
        }
    }
}

/// Handles to the storage facades.
#[derive(Debug, Clone)]
pub struct StorageHandles {
    pub writer: SampleWriter,
    pub reader: SampleReader,
}
