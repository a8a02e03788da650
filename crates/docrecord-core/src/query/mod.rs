//! Query layer.
//!
//! Framework-style query options are translated into engine-neutral
//! [`QueryDescriptor`](docrecord_proto::QueryDescriptor)s by [`QueryBuilder`]
//! and executed lazily through a [`Cursor`]. The [`FilterEvaluator`] matches
//! descriptor predicates against stored record bodies.

pub mod conditions;
mod cursor;
mod filter;
mod options;

pub use cursor::Cursor;
pub use filter::FilterEvaluator;
pub use options::{
    FindResult, FinderScope, QueryBuilder, QueryOptions, QuerySource, FIND_ALL, FIND_FIRST,
};
