//! Entity catalog for docrecord.
//!
//! The catalog holds the static schema of every document type: fields,
//! associations, validation rules, named finders, accessor tables and
//! lifecycle hooks.

mod catalog;
mod entity;
mod field;
mod relation;
mod types;

pub use catalog::Catalog;
pub use entity::{EntityDef, FieldGetter, FieldSetter, DEFAULT_DB_CONFIG};
pub use field::FieldDef;
pub use relation::{AssociationDef, AssociationKind, CollectionStrategy};
pub use types::{FieldType, ScalarType};
