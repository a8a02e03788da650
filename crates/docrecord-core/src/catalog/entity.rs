//! Entity definitions.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use docrecord_proto::Value;

use super::field::FieldDef;
use super::relation::AssociationDef;
use crate::document::{Document, DocumentHooks, NoHooks};
use crate::error::Error;
use crate::query::FinderScope;
use crate::validation::ValidationRule;

/// Datasource used when an entity does not name one.
pub const DEFAULT_DB_CONFIG: &str = "default";

/// Setter registered for a field; preferred over direct assignment.
pub type FieldSetter = Arc<dyn Fn(&mut Document, Value) + Send + Sync>;

/// Getter registered for a field; preferred over the raw stored value.
pub type FieldGetter = Arc<dyn Fn(&Document) -> Option<Value> + Send + Sync>;

/// An entity definition (document type schema).
///
/// Definitions are built once, registered with the
/// [`Catalog`](super::Catalog) and immutable afterwards; every document of
/// the type shares the same `Arc<EntityDef>`.
#[derive(Clone)]
pub struct EntityDef {
    /// Entity name (unique within the catalog).
    pub name: String,
    /// Name of the identifier field.
    pub identity_field: String,
    /// Field definitions.
    pub fields: Vec<FieldDef>,
    /// Association definitions.
    pub associations: Vec<AssociationDef>,
    /// Validation rules per field, evaluated in declaration order.
    pub rules: BTreeMap<String, Vec<ValidationRule>>,
    /// Named finders.
    pub finders: BTreeMap<String, FinderScope>,
    /// Datasource name.
    pub db_config: String,
    setters: BTreeMap<String, FieldSetter>,
    getters: BTreeMap<String, FieldGetter>,
    hooks: Arc<dyn DocumentHooks>,
}

impl fmt::Debug for EntityDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDef")
            .field("name", &self.name)
            .field("identity_field", &self.identity_field)
            .field("fields", &self.fields)
            .field("associations", &self.associations)
            .field("rules", &self.rules)
            .field("finders", &self.finders)
            .field("db_config", &self.db_config)
            .field("setters", &self.setters.keys().collect::<Vec<_>>())
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl EntityDef {
    /// Create a new entity definition with an `id` identifier field.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity_field: "id".to_string(),
            fields: Vec::new(),
            associations: Vec::new(),
            rules: BTreeMap::new(),
            finders: BTreeMap::new(),
            db_config: DEFAULT_DB_CONFIG.to_string(),
            setters: BTreeMap::new(),
            getters: BTreeMap::new(),
            hooks: Arc::new(NoHooks),
        }
    }

    /// Set the identifier field name.
    pub fn with_identity_field(mut self, field: impl Into<String>) -> Self {
        self.identity_field = field.into();
        self
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Add an association.
    pub fn with_association(mut self, association: AssociationDef) -> Self {
        self.associations.push(association);
        self
    }

    /// Append a validation rule for a field.
    pub fn with_rule(mut self, field: impl Into<String>, rule: ValidationRule) -> Self {
        self.rules.entry(field.into()).or_default().push(rule);
        self
    }

    /// Declare a named finder.
    pub fn with_finder(mut self, name: impl Into<String>, scope: FinderScope) -> Self {
        self.finders.insert(name.into(), scope);
        self
    }

    /// Set the datasource name.
    pub fn with_db_config(mut self, db_config: impl Into<String>) -> Self {
        self.db_config = db_config.into();
        self
    }

    /// Register a setter for a field.
    pub fn with_setter<F>(mut self, field: impl Into<String>, setter: F) -> Self
    where
        F: Fn(&mut Document, Value) + Send + Sync + 'static,
    {
        self.setters.insert(field.into(), Arc::new(setter));
        self
    }

    /// Register a getter for a field.
    pub fn with_getter<F>(mut self, field: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Document) -> Option<Value> + Send + Sync + 'static,
    {
        self.getters.insert(field.into(), Arc::new(getter));
        self
    }

    /// Install lifecycle hooks.
    pub fn with_hooks(mut self, hooks: impl DocumentHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get an association by its field name.
    pub fn get_association(&self, field: &str) -> Option<&AssociationDef> {
        self.associations.iter().find(|a| a.field == field)
    }

    /// Get an association by its alias.
    pub fn association_by_alias(&self, alias: &str) -> Option<&AssociationDef> {
        self.associations.iter().find(|a| a.alias() == alias)
    }

    /// Check if a name is backed by an association.
    pub fn is_association_field(&self, name: &str) -> bool {
        self.get_association(name).is_some()
    }

    /// Check if a field is mapped as a timestamp.
    pub fn is_timestamp_field(&self, name: &str) -> bool {
        self.get_field(name).is_some_and(FieldDef::is_timestamp)
    }

    /// Registered setter for a field.
    pub fn setter(&self, field: &str) -> Option<&FieldSetter> {
        self.setters.get(field)
    }

    /// Registered getter for a field.
    pub fn getter(&self, field: &str) -> Option<&FieldGetter> {
        self.getters.get(field)
    }

    /// Lifecycle hooks.
    pub fn hooks(&self) -> &Arc<dyn DocumentHooks> {
        &self.hooks
    }

    /// Check the definition for consistency.
    pub fn validate(&self) -> Result<(), Error> {
        let mut aliases = HashSet::new();
        for association in &self.associations {
            if !aliases.insert(association.alias()) {
                return Err(Error::DuplicateAlias {
                    entity: self.name.clone(),
                    alias: association.alias().to_string(),
                });
            }
        }
        Ok(())
    }
}
