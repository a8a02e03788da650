//! Document store implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use tracing::{debug, info};

use super::{Record, StorageConfig};
use crate::document::DocumentId;
use crate::error::Error;

/// Tree name for document data.
const DATA_TREE: &str = "data";

/// Tree name for entity type index.
const TYPE_INDEX_TREE: &str = "index:entity_type";

/// A write staged by the unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert or replace a document.
    Put(Record),
    /// Remove a document.
    Remove {
        /// Entity type.
        entity: String,
        /// Document identifier.
        id: DocumentId,
    },
}

/// Persistence seam used by the document manager.
pub trait DocumentStore: Send + Sync {
    /// Fetch one document.
    fn get(&self, entity: &str, id: &str) -> Result<Option<Record>, Error>;

    /// Fetch every document of an entity type.
    fn scan(&self, entity: &str) -> Result<Vec<Record>, Error>;

    /// Apply a batch of writes atomically.
    fn apply(&self, ops: &[WriteOp]) -> Result<(), Error>;

    /// Flush pending writes to durable storage.
    fn flush(&self) -> Result<(), Error>;
}

/// Generate a new document identifier (hex-encoded, time-ordered).
pub fn generate_id() -> DocumentId {
    // Counter to ensure uniqueness even with same timestamp
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let counter = COUNTER.fetch_add(1, Ordering::SeqCst);

    let mut id = [0u8; 16];
    id[..8].copy_from_slice(&now.to_be_bytes());
    id[8..16].copy_from_slice(&counter.to_be_bytes());

    hex::encode(id)
}

/// The sled-backed document store.
pub struct SledStore {
    /// The underlying sled database.
    db: Db,

    /// Tree for document records, keyed by identifier.
    data_tree: Tree,

    /// Tree for entity type index (entity_type + 0 + id -> empty).
    type_index_tree: Tree,
}

impl SledStore {
    /// Open or create a store with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let sled_config = config.to_sled_config();
        let db = sled_config.open()?;
        let data_tree = db.open_tree(DATA_TREE)?;
        let type_index_tree = db.open_tree(TYPE_INDEX_TREE)?;

        info!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            "Opened document store"
        );

        Ok(Self {
            db,
            data_tree,
            type_index_tree,
        })
    }

    /// Get the index key for an entity type + document ID.
    fn type_index_key(entity_type: &str, id: &str) -> Vec<u8> {
        let mut key = Self::type_index_prefix(entity_type);
        key.extend_from_slice(id.as_bytes());
        key
    }

    /// Get the prefix for scanning all documents of a type.
    fn type_index_prefix(entity_type: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(entity_type.len() + 1);
        prefix.extend_from_slice(entity_type.as_bytes());
        prefix.push(0); // Null separator
        prefix
    }
}

impl DocumentStore for SledStore {
    fn get(&self, entity: &str, id: &str) -> Result<Option<Record>, Error> {
        match self.data_tree.get(id.as_bytes())? {
            Some(bytes) => {
                let record = Record::from_bytes(&bytes)?;
                Ok((record.entity == entity).then_some(record))
            }
            None => Ok(None),
        }
    }

    fn scan(&self, entity: &str) -> Result<Vec<Record>, Error> {
        let prefix = Self::type_index_prefix(entity);
        let prefix_len = prefix.len();

        let mut records = Vec::new();
        for result in self.type_index_tree.scan_prefix(&prefix) {
            let (key, _) = result?;
            let id = std::str::from_utf8(&key[prefix_len..]).map_err(|_| Error::InvalidKey)?;
            if let Some(record) = self.get(entity, id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn apply(&self, ops: &[WriteOp]) -> Result<(), Error> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut encoded = Vec::with_capacity(ops.len());
        for op in ops {
            let bytes = match op {
                WriteOp::Put(record) => Some(record.to_bytes()?),
                WriteOp::Remove { .. } => None,
            };
            encoded.push((op, bytes));
        }

        let result: Result<(), TransactionError<Error>> = (&self.data_tree, &self.type_index_tree)
            .transaction(|(data_tx, type_tx)| {
                for (op, bytes) in &encoded {
                    match (op, bytes) {
                        (WriteOp::Put(record), Some(bytes)) => {
                            data_tx.insert(record.id.as_bytes(), bytes.as_slice())?;
                            type_tx.insert(
                                Self::type_index_key(&record.entity, &record.id),
                                Vec::<u8>::new(),
                            )?;
                        }
                        (WriteOp::Remove { entity, id }, _) => {
                            data_tx.remove(id.as_bytes())?;
                            type_tx.remove(Self::type_index_key(entity, id))?;
                        }
                        (WriteOp::Put(_), None) => {
                            return Err(ConflictableTransactionError::Abort(Error::Transaction(
                                "record was not encoded".to_string(),
                            )));
                        }
                    }
                }
                Ok(())
            });

        match result {
            Ok(()) => {
                debug!(ops = ops.len(), "Applied write batch");
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }

    fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrecord_proto::Value;
    use std::collections::BTreeMap;

    fn record(entity: &str, id: &str, name: &str) -> Record {
        let mut body = BTreeMap::new();
        body.insert("name".to_string(), Value::from(name));
        Record::new(entity, id, body)
    }

    #[test]
    fn test_put_get_remove() {
        let store = SledStore::open(StorageConfig::temporary()).unwrap();
        store
            .apply(&[WriteOp::Put(record("Account", "a1", "savings"))])
            .unwrap();

        let loaded = store.get("Account", "a1").unwrap().unwrap();
        assert_eq!(loaded.body["name"], Value::from("savings"));
        assert!(store.get("User", "a1").unwrap().is_none());

        store
            .apply(&[WriteOp::Remove {
                entity: "Account".to_string(),
                id: "a1".to_string(),
            }])
            .unwrap();
        assert!(store.get("Account", "a1").unwrap().is_none());
        assert!(store.scan("Account").unwrap().is_empty());
    }

    #[test]
    fn test_scan_by_type() {
        let store = SledStore::open(StorageConfig::temporary()).unwrap();
        store
            .apply(&[
                WriteOp::Put(record("Account", "a1", "one")),
                WriteOp::Put(record("Account", "a2", "two")),
                WriteOp::Put(record("User", "u1", "jose")),
            ])
            .unwrap();

        assert_eq!(store.scan("Account").unwrap().len(), 2);
        assert_eq!(store.scan("User").unwrap().len(), 1);
        assert!(store.scan("Acc").unwrap().is_empty());
    }

    #[test]
    fn test_generate_id_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }
}
