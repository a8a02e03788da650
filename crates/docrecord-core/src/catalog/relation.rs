//! Association definitions between entities.

/// Kind of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    /// A single embedded document, owned by its parent.
    EmbedOne,
    /// A collection of embedded documents, owned by their parent.
    EmbedMany,
    /// A single referenced document, linked by identifier.
    ReferenceOne,
    /// A collection of referenced documents, linked by identifiers.
    ReferenceMany,
}

impl AssociationKind {
    /// Check if this association holds a collection.
    pub fn is_many(&self) -> bool {
        matches!(self, AssociationKind::EmbedMany | AssociationKind::ReferenceMany)
    }

    /// Check if the associated documents are stored inline.
    pub fn is_embedded(&self) -> bool {
        matches!(self, AssociationKind::EmbedOne | AssociationKind::EmbedMany)
    }

    /// Check if the associated documents are stored independently.
    pub fn is_reference(&self) -> bool {
        !self.is_embedded()
    }
}

/// How a many-association is written back on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionStrategy {
    /// Append new elements to the stored collection.
    #[default]
    PushAll,
    /// Replace the stored collection.
    Set,
}

/// An association definition on an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationDef {
    /// Field holding the association.
    pub field: String,
    /// Association kind.
    pub kind: AssociationKind,
    /// Target entity name.
    pub target: String,
    /// Display name used as the bulk-assignment and error key.
    /// Defaults to the target entity name.
    pub alias: Option<String>,
    /// Write strategy for many-associations.
    pub strategy: CollectionStrategy,
    /// Inverse side of a reference-one.
    pub belongs_to: bool,
}

impl AssociationDef {
    /// Create an association of the given kind.
    pub fn new(field: impl Into<String>, kind: AssociationKind, target: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            target: target.into(),
            alias: None,
            strategy: CollectionStrategy::default(),
            belongs_to: false,
        }
    }

    /// Create an embed-one association.
    pub fn embed_one(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(field, AssociationKind::EmbedOne, target)
    }

    /// Create an embed-many association.
    pub fn embed_many(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(field, AssociationKind::EmbedMany, target)
    }

    /// Create a reference-one association.
    pub fn reference_one(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(field, AssociationKind::ReferenceOne, target)
    }

    /// Create a reference-many association.
    pub fn reference_many(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(field, AssociationKind::ReferenceMany, target)
    }

    /// Create the inverse side of a reference-one.
    pub fn belongs_to(field: impl Into<String>, target: impl Into<String>) -> Self {
        let mut def = Self::reference_one(field, target);
        def.belongs_to = true;
        def
    }

    /// Set the alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the collection strategy.
    pub fn with_strategy(mut self, strategy: CollectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// The effective alias.
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.target)
    }

    /// Check if this association holds a collection.
    pub fn is_many(&self) -> bool {
        self.kind.is_many()
    }

    /// Association type in record-framework vocabulary.
    pub fn association_type(&self) -> &'static str {
        if self.belongs_to {
            "belongsTo"
        } else if self.is_many() {
            "hasMany"
        } else {
            "hasOne"
        }
    }
}
