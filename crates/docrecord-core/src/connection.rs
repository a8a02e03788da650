//! Named datasources.
//!
//! Entities pick their datasource through [`EntityDef::db_config`]; the
//! [`ConnectionManager`] resolves that name to a [`DocumentManager`].

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::catalog::{Catalog, EntityDef};
use crate::error::Error;
use crate::manager::{DocumentManager, ManagerConfig};

/// Registry of document managers keyed by datasource name.
#[derive(Default)]
pub struct ConnectionManager {
    managers: DashMap<String, Arc<DocumentManager>>,
}

impl ConnectionManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manager under a datasource name, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, manager: DocumentManager) -> Arc<DocumentManager> {
        let manager = Arc::new(manager);
        self.managers.insert(name.into(), Arc::clone(&manager));
        manager
    }

    /// Open a sled-backed manager and register it.
    pub fn open(
        &self,
        name: impl Into<String>,
        catalog: Arc<Catalog>,
        config: ManagerConfig,
    ) -> Result<Arc<DocumentManager>, Error> {
        let name = name.into();
        let manager = DocumentManager::open(catalog, config)?;
        info!(datasource = %name, "Registered datasource");
        Ok(self.register(name, manager))
    }

    /// Look up a datasource.
    pub fn get(&self, name: &str) -> Result<Arc<DocumentManager>, Error> {
        self.managers
            .get(name)
            .map(|m| Arc::clone(m.value()))
            .ok_or_else(|| Error::Configuration(format!("datasource '{name}' is not configured")))
    }

    /// The manager serving an entity type.
    pub fn manager_for(&self, entity: &EntityDef) -> Result<Arc<DocumentManager>, Error> {
        self.get(&entity.db_config)
    }

    /// Drop a datasource.
    pub fn remove(&self, name: &str) -> Option<Arc<DocumentManager>> {
        self.managers.remove(name).map(|(_, manager)| manager)
    }

    /// Configured datasource names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.managers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
