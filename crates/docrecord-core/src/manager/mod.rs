//! The persistence engine.
//!
//! [`DocumentManager`] sits between documents and the [`DocumentStore`]: it
//! assigns identifiers, runs lifecycle hooks, stages writes in a unit of
//! work and commits them on [`flush`](DocumentManager::flush). Queries built
//! by the query layer are executed here.

mod assign;
mod codec;
mod config;
mod unit_of_work;

pub use config::ManagerConfig;

use std::sync::Arc;
use std::time::Instant;

use docrecord_proto::{OrderDirection, QueryDescriptor, Value};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::catalog::{Catalog, EntityDef};
use crate::document::{AssociationSlot, Document, DocumentState};
use crate::error::Error;
use crate::query::{
    Cursor, FilterEvaluator, FindResult, FinderScope, QueryBuilder, QuerySource, FIND_FIRST,
};
use crate::storage::{current_timestamp, generate_id, DocumentStore, Record, SledStore, WriteOp};
use crate::validation::ValidateOptions;

use codec::Hydrator;
use unit_of_work::{Committed, PendingOp, UnitOfWork};

/// Field stamped on first persist.
pub const CREATED_FIELD: &str = "created";

/// Field stamped on every update.
pub const MODIFIED_FIELD: &str = "modified";

/// An executed query, as recorded in the query log.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLogEntry {
    /// The descriptor that ran.
    pub query: QueryDescriptor,
    /// Number of documents returned.
    pub returned: usize,
    /// Execution time in microseconds.
    pub took_micros: u64,
}

/// Data-mapper persistence engine for one datasource.
pub struct DocumentManager {
    catalog: Arc<Catalog>,
    store: Arc<dyn DocumentStore>,
    config: ManagerConfig,
    unit_of_work: Mutex<UnitOfWork>,
    query_log: Mutex<Vec<QueryLogEntry>>,
}

impl DocumentManager {
    /// Open a manager over a sled store built from `config.storage`.
    pub fn open(catalog: Arc<Catalog>, config: ManagerConfig) -> Result<Self, Error> {
        let store = SledStore::open(config.storage.clone())?;
        info!(
            entities = catalog.list_entities().len(),
            log_queries = config.log_queries,
            "Opened document manager"
        );
        Ok(Self::with_store(catalog, Arc::new(store), config))
    }

    /// Create a manager over an existing store.
    pub fn with_store(
        catalog: Arc<Catalog>,
        store: Arc<dyn DocumentStore>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            config,
            unit_of_work: Mutex::new(UnitOfWork::default()),
            query_log: Mutex::new(Vec::new()),
        }
    }

    /// The entity registry.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// The manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Create a transient document of a registered entity type.
    pub fn create(&self, entity: &str) -> Result<Document, Error> {
        Ok(Document::new(self.catalog.get(entity)?))
    }

    /// Run validation rules. Shorthand for [`Document::validates`].
    pub fn validates(&self, doc: &mut Document, options: &ValidateOptions) -> bool {
        doc.validates(options)
    }

    /// Assign, validate, persist and flush.
    ///
    /// Returns `Ok(false)` when validation fails or a `before_save` hook
    /// cancels; errors are reserved for storage failures.
    pub fn save(&self, doc: &mut Document, data: Option<&Value>, validate: bool) -> Result<bool, Error> {
        if let Some(data) = data {
            self.set(doc, data, false)?;
        }
        if validate && !doc.validates(&ValidateOptions::new()) {
            debug!(entity = %doc.entity_name(), errors = doc.errors().len(), "Save rejected by validation");
            return Ok(false);
        }
        if !self.persist(doc)? {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// Stage a document for writing without flushing.
    ///
    /// Runs `before_save`, stamps timestamps, persists transient referenced
    /// children first so they can be linked, then assigns identifiers (to the
    /// document and its embedded children). Returns `Ok(false)` when the
    /// document's or a referenced child's `before_save` cancels; a cancelled
    /// child is reported under the association alias.
    pub fn persist(&self, doc: &mut Document) -> Result<bool, Error> {
        let def = Arc::clone(doc.definition());
        let is_update = doc.exists();

        if def.hooks().before_save(doc, is_update).is_cancel() {
            debug!(entity = %def.name, is_update, "Save cancelled by before_save");
            return Ok(false);
        }

        if self.config.auto_timestamps {
            let now = Value::Timestamp(current_timestamp());
            let stamp = if is_update { MODIFIED_FIELD } else { CREATED_FIELD };
            if def.is_timestamp_field(stamp) {
                doc.set_field(stamp, now);
            }
        }

        if let Some(alias) = self.persist_references(doc, &def)? {
            debug!(entity = %def.name, alias = %alias, "Save cancelled by a referenced document");
            doc.invalidate(alias, "Referenced document was not saved");
            return Ok(false);
        }

        let id = match doc.id() {
            Some(id) => id.to_string(),
            None => {
                let id = generate_id();
                doc.set_id(id.clone());
                id
            }
        };
        manage_embedded(doc, &def);
        doc.set_state(DocumentState::Managed);

        let mut body = codec::encode(doc);
        if is_update {
            if let Some(stored) = self.store.get(&def.name, &id)? {
                codec::merge_unloaded(doc, &mut body, &stored.body);
                codec::merge_pushed(&self.catalog, &def, &mut body, &stored.body)?;
            }
        }

        let mut unit_of_work = self.unit_of_work.lock();
        unit_of_work.stage(PendingOp {
            write: WriteOp::Put(Record::new(def.name.as_str(), id.as_str(), body)),
            committed: Committed::Saved {
                doc: doc.clone(),
                is_update,
            },
        });
        debug!(entity = %def.name, id = %id, is_update, pending = unit_of_work.len(), "Staged document");
        Ok(true)
    }

    /// Persist transient referenced children. Returns the alias of the first
    /// association whose child cancelled.
    fn persist_references(&self, doc: &mut Document, def: &EntityDef) -> Result<Option<String>, Error> {
        for association in def.associations.iter().filter(|a| a.kind.is_reference()) {
            let persisted = match doc.association_mut(&association.field) {
                Some(AssociationSlot::One(Some(child))) if child.id().is_none() => {
                    self.persist(child)?
                }
                Some(AssociationSlot::Many(children)) => {
                    let mut persisted = true;
                    for child in children.iter_mut().filter(|c| c.id().is_none()) {
                        if !self.persist(child)? {
                            persisted = false;
                            break;
                        }
                    }
                    persisted
                }
                _ => true,
            };
            if !persisted {
                return Ok(Some(association.alias().to_string()));
            }
        }
        Ok(None)
    }

    /// Remove a document and flush.
    ///
    /// Returns `Ok(false)` for documents that were never persisted or when a
    /// `before_delete` hook cancels.
    pub fn delete(&self, doc: &mut Document) -> Result<bool, Error> {
        let Some(id) = doc.id().map(str::to_string) else {
            return Ok(false);
        };
        let def = Arc::clone(doc.definition());

        if def.hooks().before_delete(doc).is_cancel() {
            debug!(entity = %def.name, id = %id, "Delete cancelled by before_delete");
            return Ok(false);
        }

        doc.set_state(DocumentState::Removed);
        self.unit_of_work.lock().stage(PendingOp {
            write: WriteOp::Remove {
                entity: def.name.clone(),
                id,
            },
            committed: Committed::Deleted(doc.clone()),
        });
        self.flush()?;
        Ok(true)
    }

    /// Commit every staged write as one batch, make it durable, then fire
    /// `after_save` and `after_delete` hooks.
    pub fn flush(&self) -> Result<(), Error> {
        let ops = self.unit_of_work.lock().take();
        if ops.is_empty() {
            return Ok(());
        }

        let writes: Vec<WriteOp> = ops.iter().map(|op| op.write.clone()).collect();
        if let Err(e) = self.store.apply(&writes) {
            self.unit_of_work.lock().restore(ops);
            return Err(e);
        }
        self.store.flush()?;
        debug!(writes = writes.len(), "Flushed unit of work");

        for op in ops {
            match op.committed {
                Committed::Saved { doc, is_update } => {
                    doc.definition().hooks().after_save(&doc, is_update)
                }
                Committed::Deleted(doc) => doc.definition().hooks().after_delete(&doc),
            }
        }
        Ok(())
    }

    /// Number of writes waiting for a flush.
    pub fn pending(&self) -> usize {
        self.unit_of_work.lock().len()
    }

    /// Run a finder.
    ///
    /// `all` (and options-scoped finders) yield a cursor, `first` a single
    /// optional document. Hook finders pass their result through
    /// `find_after`. Returns `Ok(None)` when `find_before` cancels.
    pub fn find<'m>(
        &'m self,
        entity: &str,
        finder: &str,
        source: impl Into<QuerySource>,
    ) -> Result<Option<FindResult<'m>>, Error> {
        let def = self.catalog.get(entity)?;
        let builder = QueryBuilder::new(&def).with_finder(finder);
        let is_hook = matches!(builder.scope()?, Some(FinderScope::Hook));

        let Some(query) = builder.build(source)? else {
            return Ok(None);
        };

        let mut cursor = Cursor::new(self, query);
        let result = if finder == FIND_FIRST {
            FindResult::One(cursor.single_result()?)
        } else {
            FindResult::Many(cursor)
        };

        if is_hook {
            return def.hooks().find_after(finder, result).map(Some);
        }
        Ok(Some(result))
    }

    /// Load a document by identifier.
    pub fn find_by_id(&self, entity: &str, id: &str) -> Result<Option<Document>, Error> {
        let def = self.catalog.get(entity)?;
        match self.store.get(entity, id)? {
            Some(record) => Ok(Some(self.hydrator().document(
                def,
                &record.id,
                &record.body,
                self.config.reference_depth,
            )?)),
            None => Ok(None),
        }
    }

    /// Replace a persisted document's contents with the stored version.
    pub fn refresh(&self, doc: &mut Document) -> Result<(), Error> {
        let id = doc.id().map(str::to_string).ok_or(Error::NotFound)?;
        let fresh = self
            .find_by_id(doc.entity_name(), &id)?
            .ok_or(Error::NotFound)?;
        *doc = fresh;
        Ok(())
    }

    /// Execute a descriptor: filter, sort, skip, limit, project, hydrate.
    pub fn execute(&self, query: &QueryDescriptor) -> Result<Vec<Document>, Error> {
        let start = Instant::now();
        let def = self.catalog.get(&query.entity)?;
        let mut records = self.matching(query)?;

        if let Some(order) = &query.order {
            records.sort_by(|a, b| {
                let left = FilterEvaluator::resolve(&a.body, &order.field);
                let right = FilterEvaluator::resolve(&b.body, &order.field);
                let ordering =
                    FilterEvaluator::sort_order(left.first().copied(), right.first().copied());
                match order.direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                }
            });
        }

        let matched = records.len();
        let skip = query.pagination.skip_count();
        let limit = query.pagination.limit.map_or(usize::MAX, |l| l as usize);

        let hydrator = self.hydrator().with_projection(query);
        let documents = records
            .iter()
            .skip(skip)
            .take(limit)
            .map(|record| {
                hydrator.document(
                    Arc::clone(&def),
                    &record.id,
                    &record.body,
                    self.config.reference_depth,
                )
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let took_micros = start.elapsed().as_micros() as u64;
        debug!(
            entity = %query.entity,
            filters = query.filters.len(),
            matched,
            returned = documents.len(),
            took_micros,
            "Executed query"
        );

        if self.config.log_queries {
            self.query_log.lock().push(QueryLogEntry {
                query: query.clone(),
                returned: documents.len(),
                took_micros,
            });
        }

        Ok(documents)
    }

    /// Number of documents matched by the descriptor's filters, ignoring
    /// skip and limit.
    pub fn count_matching(&self, query: &QueryDescriptor) -> Result<usize, Error> {
        self.catalog.get(&query.entity)?;
        Ok(self.matching(query)?.len())
    }

    /// Executed queries, oldest first. With `clear` the log is emptied.
    pub fn query_log(&self, clear: bool) -> Vec<QueryLogEntry> {
        let mut log = self.query_log.lock();
        if clear {
            std::mem::take(&mut *log)
        } else {
            log.clone()
        }
    }

    fn matching(&self, query: &QueryDescriptor) -> Result<Vec<Record>, Error> {
        let mut records = self.store.scan(&query.entity)?;
        records.retain(|record| FilterEvaluator::matches_all(&query.filters, &record.body));
        Ok(records)
    }

    fn hydrator(&self) -> Hydrator<'_> {
        Hydrator::new(&self.catalog, self.store.as_ref())
    }
}

/// Give embedded children identifiers and mark them managed.
fn manage_embedded(doc: &mut Document, def: &EntityDef) {
    for association in def.associations.iter().filter(|a| a.kind.is_embedded()) {
        let children: Vec<&mut Document> = match doc.association_mut(&association.field) {
            Some(AssociationSlot::One(Some(child))) => vec![&mut **child],
            Some(AssociationSlot::Many(children)) => {
                children.iter_mut().map(|child| &mut **child).collect()
            }
            _ => continue,
        };
        for child in children {
            if child.id().is_none() {
                child.set_id(generate_id());
            }
            let child_def = Arc::clone(child.definition());
            manage_embedded(child, &child_def);
            child.set_state(DocumentState::Managed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AssociationDef, FieldDef, ScalarType};
    use crate::query::QueryOptions;
    use crate::storage::StorageConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::validation::ValidationRule;

    fn manager() -> DocumentManager {
        let catalog = Catalog::new();
        catalog
            .register(EntityDef::new("Address").with_field(FieldDef::scalar("city", ScalarType::String)))
            .unwrap();
        catalog
            .register(
                EntityDef::new("User")
                    .with_field(FieldDef::scalar("username", ScalarType::String))
                    .with_field(FieldDef::scalar("salary", ScalarType::Float64))
                    .with_field(FieldDef::optional_scalar("created", ScalarType::Timestamp))
                    .with_field(FieldDef::optional_scalar("modified", ScalarType::Timestamp))
                    .with_association(AssociationDef::embed_one("address", "Address"))
                    .with_rule("username", ValidationRule::rule("notEmpty")),
            )
            .unwrap();
        DocumentManager::open(
            Arc::new(catalog),
            ManagerConfig::temporary().with_log_queries(true),
        )
        .unwrap()
    }

    fn user(manager: &DocumentManager, username: &str, salary: f64) -> Document {
        let mut doc = manager.create("User").unwrap();
        doc.set_field("username", username);
        doc.set_field("salary", salary);
        doc
    }

    #[test]
    fn test_save_assigns_id_and_timestamps() {
        let manager = manager();
        let mut doc = user(&manager, "jose", 100.0);

        assert!(manager.save(&mut doc, None, true).unwrap());
        assert!(doc.exists());
        assert!(doc.id().is_some());
        assert!(matches!(doc.field("created"), Some(Value::Timestamp(_))));
        assert!(doc.field("modified").is_none());

        assert!(manager.save(&mut doc, None, true).unwrap());
        assert!(matches!(doc.field("modified"), Some(Value::Timestamp(_))));
        assert_eq!(manager.pending(), 0);
    }

    #[test]
    fn test_save_rejected_by_validation() {
        let manager = manager();
        let mut doc = user(&manager, "", 100.0);
        assert!(!manager.save(&mut doc, None, true).unwrap());
        assert!(doc.is_new());
        assert!(doc.errors().contains("username"));
    }

    #[test]
    fn test_embedded_children_get_ids() {
        let manager = manager();
        let mut doc = user(&manager, "jose", 100.0);
        let mut address = manager.create("Address").unwrap();
        address.set_field("city", "Los Angeles");
        doc.set_one("address", address).unwrap();

        manager.save(&mut doc, None, false).unwrap();
        let address = doc.one("address").unwrap();
        assert!(address.exists());
        assert!(address.id().is_some());

        let loaded = manager.find_by_id("User", doc.id().unwrap()).unwrap().unwrap();
        assert_eq!(loaded.one("address").unwrap().id(), address.id());
    }

    #[test]
    fn test_execute_sort_skip_limit() {
        let manager = manager();
        for (name, salary) in [("a", 101.0), ("b", 99.0), ("c", 150.0), ("d", 120.0)] {
            let mut doc = user(&manager, name, salary);
            manager.save(&mut doc, None, false).unwrap();
        }

        let query = QueryBuilder::new(&manager.catalog().get("User").unwrap())
            .build(
                QueryOptions::new()
                    .condition("salary >", 100)
                    .order("salary", "desc")
                    .limit(2)
                    .page(2),
            )
            .unwrap()
            .unwrap();

        let docs = manager.execute(&query).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].field("username"), Some(&Value::from("a")));
        assert_eq!(manager.count_matching(&query).unwrap(), 3);
        assert_eq!(manager.query_log(true).len(), 1);
        assert!(manager.query_log(false).is_empty());
    }

    #[test]
    fn test_delete() {
        let manager = manager();
        let mut doc = user(&manager, "jose", 100.0);
        assert!(!manager.delete(&mut doc).unwrap());

        manager.save(&mut doc, None, false).unwrap();
        let id = doc.id().unwrap().to_string();
        assert!(manager.delete(&mut doc).unwrap());
        assert_eq!(doc.state(), DocumentState::Removed);
        assert!(manager.find_by_id("User", &id).unwrap().is_none());
        assert!(matches!(manager.refresh(&mut doc), Err(Error::NotFound)));
    }

    #[test]
    fn test_refresh_discards_unsaved_changes() {
        let manager = manager();
        let mut doc = user(&manager, "jose", 100.0);
        manager.save(&mut doc, None, false).unwrap();

        doc.set_field("username", "pepe");
        manager.refresh(&mut doc).unwrap();
        assert_eq!(doc.field("username"), Some(&Value::from("jose")));
        assert!(doc.exists());
    }

    struct CountingStore {
        inner: SledStore,
        flushes: AtomicUsize,
    }

    impl DocumentStore for CountingStore {
        fn get(&self, entity: &str, id: &str) -> Result<Option<Record>, Error> {
            self.inner.get(entity, id)
        }

        fn scan(&self, entity: &str) -> Result<Vec<Record>, Error> {
            self.inner.scan(entity)
        }

        fn apply(&self, ops: &[WriteOp]) -> Result<(), Error> {
            self.inner.apply(ops)
        }

        fn flush(&self) -> Result<(), Error> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            self.inner.flush()
        }
    }

    #[test]
    fn test_flush_makes_batches_durable() {
        let store = Arc::new(CountingStore {
            inner: SledStore::open(StorageConfig::temporary()).unwrap(),
            flushes: Default::default(),
        });
        let manager = DocumentManager::with_store(
            Arc::clone(manager().catalog()),
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            ManagerConfig::temporary(),
        );

        manager.flush().unwrap();
        assert_eq!(store.flushes.load(Ordering::SeqCst), 0);

        let mut doc = user(&manager, "jose", 100.0);
        assert!(manager.save(&mut doc, None, true).unwrap());
        assert_eq!(store.flushes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_find_first() {
        let manager = manager();
        let mut doc = user(&manager, "jose", 100.0);
        manager.save(&mut doc, None, false).unwrap();

        let found = manager
            .find("User", FIND_FIRST, QueryOptions::new().condition("username", "jose"))
            .unwrap()
            .unwrap()
            .into_document()
            .unwrap();
        assert_eq!(found.id(), doc.id());

        let missing = manager
            .find("User", FIND_FIRST, QueryOptions::new().condition("username", "pepe"))
            .unwrap()
            .unwrap()
            .into_document();
        assert!(missing.is_none());
    }
}
