//! Registry of entity definitions.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::EntityDef;
use crate::error::Error;

/// The registry of entity definitions.
///
/// Read-mostly and safe for concurrent readers. A definition is immutable
/// once registered; re-registering a name replaces the shared definition for
/// documents created afterwards.
#[derive(Debug, Default)]
pub struct Catalog {
    entities: DashMap<String, Arc<EntityDef>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity definition.
    pub fn register(&self, entity: EntityDef) -> Result<Arc<EntityDef>, Error> {
        entity.validate()?;
        let entity = Arc::new(entity);
        debug!(
            entity = %entity.name,
            fields = entity.fields.len(),
            associations = entity.associations.len(),
            "Registered entity"
        );
        self.entities
            .insert(entity.name.clone(), Arc::clone(&entity));
        Ok(entity)
    }

    /// Get an entity definition by name.
    pub fn get(&self, name: &str) -> Result<Arc<EntityDef>, Error> {
        self.entities
            .get(name)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Check if an entity is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// List all registered entity names, sorted.
    pub fn list_entities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
