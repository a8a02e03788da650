//! Core error types.

use thiserror::Error;

/// Core document layer errors.
///
/// Validation failures and hook cancellations are not errors: `save`,
/// `delete` and `validates` report them as `false` results with the
/// document's error map populated.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Record not found.
    #[error("record not found")]
    NotFound,

    /// Entity type is not registered.
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),

    /// Finder name is neither built in nor declared by the entity.
    #[error("unknown finder '{finder}' for entity {entity}")]
    UnknownFinder { entity: String, finder: String },

    /// Dictionary-style access to a name that is not a field, association or
    /// the entity itself.
    #[error("invalid offset '{offset}' for entity {entity}")]
    InvalidOffset { entity: String, offset: String },

    /// Two associations of one entity share an alias.
    #[error("duplicate association alias '{alias}' on entity {entity}")]
    DuplicateAlias { entity: String, alias: String },

    /// No datasource is configured under the given name.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
