//! docrecord value and query types.
//!
//! This crate defines the engine-neutral types shared by the query layer and
//! the persistence engine.
//!
//! # Modules
//!
//! - [`value`] - Runtime value types for document fields and conditions
//! - [`query`] - Query descriptor, filter predicates, sort and pagination
//! - [`error`] - Encoding error types

pub mod error;
pub mod query;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use query::{FilterExpr, OrderDirection, OrderSpec, Pagination, QueryDescriptor};
pub use value::Value;
