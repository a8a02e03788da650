//! Schema-typed mutable documents.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use docrecord_proto::Value;

use crate::catalog::{AssociationDef, AssociationKind, EntityDef};
use crate::error::Error;
use crate::validation::{self, ValidateOptions, ValidationErrors, ValidationRule};

/// Document identifier, assigned by the persistence engine.
pub type DocumentId = String;

static NULL: Value = Value::Null;

/// Lifecycle state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    /// Constructed in memory, never persisted.
    Transient,
    /// Persisted and tracked by a manager.
    Managed,
    /// Removed from the store.
    Removed,
}

/// Loaded contents of an association.
#[derive(Debug, Clone)]
pub enum AssociationSlot {
    /// Single association.
    One(Option<Box<Document>>),
    /// Collection association. Boxed elements keep their address when the
    /// collection is edited.
    Many(Vec<Box<Document>>),
}

/// Result of a dictionary-style lookup.
#[derive(Debug, Clone, Copy)]
pub enum Offset<'a> {
    /// The document itself (looked up by entity name).
    Document(&'a Document),
    /// The document identifier.
    Id(Option<&'a str>),
    /// A plain field. Declared fields that are unset read as `Null`.
    Field(&'a Value),
    /// A single association.
    One(Option<&'a Document>),
    /// A collection association.
    Many(&'a [Box<Document>]),
}

/// Description of an association in record-framework vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationInfo {
    /// Field holding the association.
    pub field: String,
    /// Association alias.
    pub alias: String,
    /// Target entity name.
    pub target: String,
    /// `hasOne`, `hasMany` or `belongsTo`.
    pub association_type: &'static str,
    /// Stored inline in the parent.
    pub embedded: bool,
    /// Stored independently and linked by identifier.
    pub reference: bool,
}

impl From<&AssociationDef> for AssociationInfo {
    fn from(def: &AssociationDef) -> Self {
        Self {
            field: def.field.clone(),
            alias: def.alias().to_string(),
            target: def.target.clone(),
            association_type: def.association_type(),
            embedded: def.kind.is_embedded(),
            reference: def.kind.is_reference(),
        }
    }
}

/// A document: an instance of a registered entity type.
#[derive(Debug, Clone)]
pub struct Document {
    def: Arc<EntityDef>,
    id: Option<DocumentId>,
    fields: BTreeMap<String, Value>,
    associations: BTreeMap<String, AssociationSlot>,
    unresolved: BTreeMap<String, Value>,
    unloaded: BTreeSet<String>,
    rules: Option<BTreeMap<String, Vec<ValidationRule>>>,
    errors: ValidationErrors,
    state: DocumentState,
}

impl Document {
    /// Create a transient document with field defaults applied.
    pub fn new(def: Arc<EntityDef>) -> Self {
        let fields = def
            .fields
            .iter()
            .filter_map(|f| f.default.clone().map(|v| (f.name.clone(), v)))
            .collect();
        let associations = def
            .associations
            .iter()
            .map(|a| {
                let slot = if a.is_many() {
                    AssociationSlot::Many(Vec::new())
                } else {
                    AssociationSlot::One(None)
                };
                (a.field.clone(), slot)
            })
            .collect();

        Self {
            def,
            id: None,
            fields,
            associations,
            unresolved: BTreeMap::new(),
            unloaded: BTreeSet::new(),
            rules: None,
            errors: ValidationErrors::new(),
            state: DocumentState::Transient,
        }
    }

    /// Entity name.
    pub fn entity_name(&self) -> &str {
        &self.def.name
    }

    /// Entity definition.
    pub fn definition(&self) -> &Arc<EntityDef> {
        &self.def
    }

    /// Identifier, once assigned.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Lifecycle state.
    pub fn state(&self) -> DocumentState {
        self.state
    }

    /// Check if the document has never been persisted.
    pub fn is_new(&self) -> bool {
        self.state == DocumentState::Transient
    }

    /// Check if the document is managed by the persistence engine.
    pub fn exists(&self) -> bool {
        self.state == DocumentState::Managed
    }

    pub(crate) fn set_id(&mut self, id: DocumentId) {
        self.id = Some(id);
    }

    pub(crate) fn set_state(&mut self, state: DocumentState) {
        self.state = state;
    }

    /// Raw stored value of a field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Value of a field, through its registered getter when there is one.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.def.getter(name) {
            Some(getter) => getter(self),
            None => self.fields.get(name).cloned(),
        }
    }

    /// All plain fields.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Assign a field directly, bypassing setters.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Remove a field.
    pub fn unset_field(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Loaded contents of an association by field name.
    pub fn association(&self, field: &str) -> Option<&AssociationSlot> {
        self.associations.get(field)
    }

    /// Mutable contents of an association by field name.
    pub fn association_mut(&mut self, field: &str) -> Option<&mut AssociationSlot> {
        self.associations.get_mut(field)
    }

    /// The document held by a single association.
    pub fn one(&self, field: &str) -> Option<&Document> {
        match self.associations.get(field) {
            Some(AssociationSlot::One(Some(doc))) => Some(&**doc),
            _ => None,
        }
    }

    /// Mutable access to the document held by a single association.
    pub fn one_mut(&mut self, field: &str) -> Option<&mut Document> {
        match self.associations.get_mut(field) {
            Some(AssociationSlot::One(Some(doc))) => Some(&mut **doc),
            _ => None,
        }
    }

    /// The documents held by a collection association.
    pub fn many(&self, field: &str) -> &[Box<Document>] {
        match self.associations.get(field) {
            Some(AssociationSlot::Many(docs)) => docs,
            _ => &[],
        }
    }

    /// Mutable access to a collection association.
    pub fn many_mut(&mut self, field: &str) -> Option<&mut Vec<Box<Document>>> {
        match self.associations.get_mut(field) {
            Some(AssociationSlot::Many(docs)) => Some(docs),
            _ => None,
        }
    }

    /// Place a document in a single association.
    pub fn set_one(&mut self, field: &str, doc: Document) -> Result<(), Error> {
        match self.associations.get_mut(field) {
            Some(AssociationSlot::One(slot)) => {
                *slot = Some(Box::new(doc));
                self.unresolved.remove(field);
                Ok(())
            }
            _ => Err(self.invalid_offset(field)),
        }
    }

    /// Append a document to a collection association.
    pub fn push_many(&mut self, field: &str, doc: Document) -> Result<(), Error> {
        match self.associations.get_mut(field) {
            Some(AssociationSlot::Many(docs)) => {
                docs.push(Box::new(doc));
                Ok(())
            }
            _ => Err(self.invalid_offset(field)),
        }
    }

    /// Empty an association, dropping unloaded references too.
    pub fn clear_association(&mut self, field: &str) -> Result<(), Error> {
        match self.associations.get_mut(field) {
            Some(AssociationSlot::One(slot)) => *slot = None,
            Some(AssociationSlot::Many(docs)) => docs.clear(),
            None => return Err(self.invalid_offset(field)),
        }
        self.unresolved.remove(field);
        Ok(())
    }

    /// Stored identifiers of references that were not loaded.
    pub fn unresolved_reference(&self, field: &str) -> Option<&Value> {
        self.unresolved.get(field)
    }

    pub(crate) fn set_unresolved_reference(&mut self, field: impl Into<String>, ids: Value) {
        self.unresolved.insert(field.into(), ids);
    }

    /// Check if the document was loaded through a projection that left
    /// stored fields out.
    pub fn is_partial(&self) -> bool {
        !self.unloaded.is_empty()
    }

    /// Stored top-level fields and associations the projection left out.
    /// Saving keeps their stored values unless they were assigned since.
    pub fn unloaded_fields(&self) -> &BTreeSet<String> {
        &self.unloaded
    }

    pub(crate) fn mark_unloaded(&mut self, field: impl Into<String>) {
        self.unloaded.insert(field.into());
    }

    /// Rules in effect: the per-instance override, else the entity's.
    pub fn rules(&self) -> &BTreeMap<String, Vec<ValidationRule>> {
        self.rules.as_ref().unwrap_or(&self.def.rules)
    }

    /// Override the entity's rules for this instance.
    pub fn set_rules(&mut self, rules: BTreeMap<String, Vec<ValidationRule>>) {
        self.rules = Some(rules);
    }

    /// Builder form of [`set_rules`](Self::set_rules).
    pub fn with_rules(mut self, rules: BTreeMap<String, Vec<ValidationRule>>) -> Self {
        self.set_rules(rules);
        self
    }

    /// Validation errors accumulated so far.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Mutable validation errors.
    pub fn errors_mut(&mut self) -> &mut ValidationErrors {
        &mut self.errors
    }

    /// Record a validation error for a field.
    pub fn invalidate(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    /// Run the validation rules. See [`validation::validate_document`].
    pub fn validates(&mut self, options: &ValidateOptions) -> bool {
        validation::validate_document(self, options)
    }

    /// Dictionary-style lookup of a field, an association (by field name or
    /// alias), the identifier, or the document itself (by entity name).
    pub fn offset(&self, name: &str) -> Result<Offset<'_>, Error> {
        if name == self.def.name {
            return Ok(Offset::Document(self));
        }
        if name == self.def.identity_field {
            return Ok(Offset::Id(self.id()));
        }

        let association = self
            .def
            .get_association(name)
            .or_else(|| self.def.association_by_alias(name));
        if let Some(association) = association {
            return match self.associations.get(&association.field) {
                Some(AssociationSlot::One(doc)) => Ok(Offset::One(doc.as_deref())),
                Some(AssociationSlot::Many(docs)) => Ok(Offset::Many(docs.as_slice())),
                None => Err(self.invalid_offset(name)),
            };
        }

        if let Some(value) = self.fields.get(name) {
            return Ok(Offset::Field(value));
        }
        if self.def.get_field(name).is_some() {
            return Ok(Offset::Field(&NULL));
        }

        Err(self.invalid_offset(name))
    }

    /// Check if [`offset`](Self::offset) would succeed.
    pub fn has_offset(&self, name: &str) -> bool {
        self.offset(name).is_ok()
    }

    /// Associations of this entity type.
    pub fn associated(&self) -> Vec<AssociationInfo> {
        self.def.associations.iter().map(AssociationInfo::from).collect()
    }

    /// Kind of the association stored under a field.
    pub fn association_kind(&self, field: &str) -> Option<AssociationKind> {
        self.def.get_association(field).map(|a| a.kind)
    }

    fn invalid_offset(&self, name: &str) -> Error {
        Error::InvalidOffset {
            entity: self.def.name.clone(),
            offset: name.to_string(),
        }
    }
}
