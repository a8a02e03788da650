//! docrecord core - active-record documents over a data-mapper engine.
//!
//! Entities are declared once in a [`Catalog`] and instantiated as
//! [`Document`]s. A [`DocumentManager`] assigns nested data, validates,
//! persists through a unit of work into a sled-backed [`DocumentStore`], and
//! runs framework-style finders through the query layer.

pub mod catalog;
pub mod connection;
pub mod document;
pub mod error;
pub mod manager;
pub mod paginate;
pub mod query;
pub mod storage;
pub mod validation;

pub use catalog::{
    AssociationDef, AssociationKind, Catalog, CollectionStrategy, EntityDef, FieldDef, FieldType,
    ScalarType, DEFAULT_DB_CONFIG,
};
pub use connection::ConnectionManager;
pub use document::{
    AssociationInfo, AssociationSlot, Document, DocumentHooks, DocumentId, DocumentState,
    FinderOutcome, HookOutcome, NoHooks, Offset,
};
pub use error::Error;
pub use manager::{DocumentManager, ManagerConfig, QueryLogEntry};
pub use paginate::{Page, PageRequest, Paginator, PaginatorConfig, PagingInfo};
pub use query::{Cursor, FindResult, FinderScope, QueryBuilder, QueryOptions, QuerySource};
pub use storage::{DocumentStore, Record, SledStore, StorageConfig, WriteOp};
pub use validation::{
    RuleContext, RuleOutcome, RuleSpec, ValidateOptions, ValidationErrors, ValidationRule,
};

/// Re-export value and query types.
pub use docrecord_proto as proto;
