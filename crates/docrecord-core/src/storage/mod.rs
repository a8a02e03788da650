//! Storage layer.
//!
//! Documents are stored as JSON [`Record`]s in sled: a data tree keyed by
//! identifier plus an entity type index for scans. Writes staged by the
//! unit of work are committed as one sled transaction.

mod config;
mod engine;
mod record;

pub use config::StorageConfig;
pub use engine::{generate_id, DocumentStore, SledStore, WriteOp};
pub use record::{current_timestamp, Record};
