//! Manager configuration.

use crate::storage::StorageConfig;

/// Configuration for a [`DocumentManager`](super::DocumentManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Store configuration, used by [`DocumentManager::open`](super::DocumentManager::open).
    pub storage: StorageConfig,

    /// Record every executed query in the query log.
    pub log_queries: bool,

    /// Maintain `created` / `modified` timestamp fields.
    pub auto_timestamps: bool,

    /// How many levels of references are loaded when hydrating.
    /// Deeper references stay unresolved identifiers.
    pub reference_depth: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            log_queries: false,
            auto_timestamps: true,
            reference_depth: 1,
        }
    }
}

impl ManagerConfig {
    /// Create a configuration storing data at the given path.
    pub fn new(storage: StorageConfig) -> Self {
        Self {
            storage,
            ..Default::default()
        }
    }

    /// Create a configuration backed by a temporary store.
    pub fn temporary() -> Self {
        Self::new(StorageConfig::temporary())
    }

    /// Enable or disable the query log.
    pub fn with_log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    /// Enable or disable automatic timestamps.
    pub fn with_auto_timestamps(mut self, enabled: bool) -> Self {
        self.auto_timestamps = enabled;
        self
    }

    /// Set the reference loading depth.
    pub fn with_reference_depth(mut self, depth: usize) -> Self {
        self.reference_depth = depth;
        self
    }
}
