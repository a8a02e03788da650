//! Conversion between documents and stored record bodies.
//!
//! Plain fields are stored as-is. Embedded documents are stored inline as
//! objects (carrying their identifier under the target's identity field);
//! referenced documents are stored as identifier strings.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use docrecord_proto::{QueryDescriptor, Value};
use tracing::debug;

use crate::catalog::{AssociationDef, AssociationKind, Catalog, CollectionStrategy, EntityDef};
use crate::document::{AssociationSlot, Document, DocumentState};
use crate::error::Error;
use crate::storage::DocumentStore;

/// Encode a document into a record body.
pub(crate) fn encode(doc: &Document) -> BTreeMap<String, Value> {
    let def = doc.definition();
    let mut body = doc.fields().clone();

    if let Some(id) = doc.id() {
        body.insert(def.identity_field.clone(), Value::from(id));
    }

    for association in &def.associations {
        match encode_association(doc, association) {
            Some(value) => body.insert(association.field.clone(), value),
            None => body.remove(&association.field),
        };
    }

    body
}

fn encode_association(doc: &Document, association: &AssociationDef) -> Option<Value> {
    let field = association.field.as_str();
    let slot = doc.association(field);

    match association.kind {
        AssociationKind::EmbedOne => match slot {
            Some(AssociationSlot::One(Some(child))) => Some(Value::Object(encode(child))),
            _ => None,
        },
        AssociationKind::EmbedMany => match slot {
            Some(AssociationSlot::Many(children)) => Some(Value::Array(
                children.iter().map(|c| Value::Object(encode(c))).collect(),
            )),
            _ => None,
        },
        AssociationKind::ReferenceOne => match slot {
            Some(AssociationSlot::One(Some(child))) => child
                .id()
                .map(Value::from)
                .or_else(|| doc.unresolved_reference(field).cloned()),
            _ => doc.unresolved_reference(field).cloned(),
        },
        AssociationKind::ReferenceMany => {
            let mut ids: Vec<Value> = doc
                .unresolved_reference(field)
                .and_then(Value::as_array)
                .map(<[Value]>::to_vec)
                .unwrap_or_default();
            for child in doc.many(field) {
                if let Some(id) = child.id() {
                    let id = Value::from(id);
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
            Some(Value::Array(ids))
        }
    }
}

/// Keep stored elements of `PushAll` collections that the new body no
/// longer carries.
pub(crate) fn merge_pushed(
    catalog: &Catalog,
    def: &EntityDef,
    body: &mut BTreeMap<String, Value>,
    stored: &BTreeMap<String, Value>,
) -> Result<(), Error> {
    for association in &def.associations {
        if !association.is_many() || association.strategy != CollectionStrategy::PushAll {
            continue;
        }
        let Some(Value::Array(stored_items)) = stored.get(&association.field) else {
            continue;
        };
        let identity = catalog.get(&association.target)?.identity_field.clone();

        let current = body
            .entry(association.field.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(items) = current else {
            continue;
        };

        let present: HashSet<String> = items
            .iter()
            .filter_map(|item| element_key(item, &identity))
            .collect();
        for item in stored_items {
            if let Some(key) = element_key(item, &identity) {
                if !present.contains(&key) {
                    items.push(item.clone());
                }
            }
        }
    }
    Ok(())
}

/// Carry over stored values of fields and associations that a projection
/// left out of `doc` and that were not assigned since.
pub(crate) fn merge_unloaded(
    doc: &Document,
    body: &mut BTreeMap<String, Value>,
    stored: &BTreeMap<String, Value>,
) {
    for field in doc.unloaded_fields() {
        let Some(value) = stored.get(field) else {
            continue;
        };
        let assigned = match doc.association(field) {
            Some(AssociationSlot::One(child)) => child.is_some(),
            Some(AssociationSlot::Many(children)) => !children.is_empty(),
            None => doc.field(field).is_some(),
        };
        if !assigned {
            body.insert(field.clone(), value.clone());
        }
    }
}

fn element_key(item: &Value, identity: &str) -> Option<String> {
    match item {
        Value::String(id) => Some(id.clone()),
        Value::Object(_) => item.get(identity).and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Builds documents from stored record bodies.
pub(crate) struct Hydrator<'a> {
    catalog: &'a Catalog,
    store: &'a dyn DocumentStore,
    projection: Option<&'a QueryDescriptor>,
}

impl<'a> Hydrator<'a> {
    pub(crate) fn new(catalog: &'a Catalog, store: &'a dyn DocumentStore) -> Self {
        Self {
            catalog,
            store,
            projection: None,
        }
    }

    /// Only hydrate the top-level fields the query projects.
    pub(crate) fn with_projection(mut self, query: &'a QueryDescriptor) -> Self {
        self.projection = Some(query);
        self
    }

    /// Hydrate a top-level document, loading references `depth` levels deep.
    pub(crate) fn document(
        &self,
        def: Arc<EntityDef>,
        id: &str,
        body: &BTreeMap<String, Value>,
        depth: usize,
    ) -> Result<Document, Error> {
        let mut doc = self.fill(def, body, depth, self.projection)?;
        doc.set_id(id.to_string());
        Ok(doc)
    }

    fn embedded(
        &self,
        def: Arc<EntityDef>,
        body: &BTreeMap<String, Value>,
        depth: usize,
    ) -> Result<Document, Error> {
        let id = body
            .get(&def.identity_field)
            .and_then(Value::as_str)
            .map(str::to_string);
        let mut doc = self.fill(def, body, depth, None)?;
        if let Some(id) = id {
            doc.set_id(id);
        }
        Ok(doc)
    }

    fn fill(
        &self,
        def: Arc<EntityDef>,
        body: &BTreeMap<String, Value>,
        depth: usize,
        projection: Option<&QueryDescriptor>,
    ) -> Result<Document, Error> {
        let mut doc = Document::new(Arc::clone(&def));

        for (key, value) in body {
            if *key == def.identity_field {
                continue;
            }
            if projection.is_some_and(|q| !q.is_projected(key)) {
                doc.unset_field(key);
                doc.mark_unloaded(key.clone());
                continue;
            }
            match def.get_association(key) {
                Some(association) => self.fill_association(&mut doc, association, value, depth)?,
                None => doc.set_field(key.clone(), value.clone()),
            }
        }

        doc.set_state(DocumentState::Managed);
        Ok(doc)
    }

    fn fill_association(
        &self,
        doc: &mut Document,
        association: &AssociationDef,
        value: &Value,
        depth: usize,
    ) -> Result<(), Error> {
        let field = association.field.as_str();
        let target = self.catalog.get(&association.target)?;

        match (association.kind, value) {
            (AssociationKind::EmbedOne, Value::Object(child)) => {
                let child = self.embedded(target, child, depth)?;
                doc.set_one(field, child)?;
            }
            (AssociationKind::EmbedMany, Value::Array(items)) => {
                for item in items {
                    if let Value::Object(child) = item {
                        let child = self.embedded(Arc::clone(&target), child, depth)?;
                        doc.push_many(field, child)?;
                    }
                }
            }
            (AssociationKind::ReferenceOne, Value::String(id)) if depth > 0 => {
                if let Some(child) = self.reference(&target, id, depth - 1)? {
                    doc.set_one(field, child)?;
                }
            }
            (AssociationKind::ReferenceMany, Value::Array(ids)) if depth > 0 => {
                for id in ids.iter().filter_map(Value::as_str) {
                    if let Some(child) = self.reference(&target, id, depth - 1)? {
                        doc.push_many(field, child)?;
                    }
                }
            }
            (AssociationKind::ReferenceOne | AssociationKind::ReferenceMany, _) => {
                doc.set_unresolved_reference(field, value.clone());
            }
            _ => {
                debug!(
                    entity = %doc.entity_name(),
                    field,
                    found = value.type_name(),
                    "Stored association has unexpected shape, skipped"
                );
            }
        }
        Ok(())
    }

    fn reference(
        &self,
        target: &Arc<EntityDef>,
        id: &str,
        depth: usize,
    ) -> Result<Option<Document>, Error> {
        match self.store.get(&target.name, id)? {
            Some(record) => {
                let mut doc = self.fill(Arc::clone(target), &record.body, depth, None)?;
                doc.set_id(id.to_string());
                Ok(Some(doc))
            }
            None => {
                debug!(entity = %target.name, id, "Dangling reference dropped");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, ScalarType};
    use crate::storage::{Record, SledStore, StorageConfig, WriteOp};

    fn catalog() -> Catalog {
        let catalog = Catalog::new();
        catalog
            .register(EntityDef::new("Address").with_field(FieldDef::scalar("city", ScalarType::String)))
            .unwrap();
        catalog
            .register(EntityDef::new("Account").with_field(FieldDef::scalar("name", ScalarType::String)))
            .unwrap();
        catalog
            .register(
                EntityDef::new("User")
                    .with_field(FieldDef::scalar("username", ScalarType::String))
                    .with_association(AssociationDef::embed_one("address", "Address"))
                    .with_association(AssociationDef::reference_many("accounts", "Account")),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn test_encode_embedded_and_references() {
        let catalog = catalog();
        let mut user = Document::new(catalog.get("User").unwrap());
        user.set_id("u1".to_string());
        user.set_field("username", "jose");

        let mut address = Document::new(catalog.get("Address").unwrap());
        address.set_id("a1".to_string());
        address.set_field("city", "Los Angeles");
        user.set_one("address", address).unwrap();

        let mut account = Document::new(catalog.get("Account").unwrap());
        account.set_id("acc1".to_string());
        user.push_many("accounts", account).unwrap();

        let body = encode(&user);
        assert_eq!(body["id"], Value::from("u1"));
        assert_eq!(body["address"].get("city"), Some(&Value::from("Los Angeles")));
        assert_eq!(body["address"].get("id"), Some(&Value::from("a1")));
        assert_eq!(body["accounts"], Value::array(["acc1"]));
    }

    #[test]
    fn test_merge_pushed_keeps_stored_elements() {
        let catalog = catalog();
        let def = catalog.get("User").unwrap();
        let mut body = BTreeMap::new();
        body.insert("accounts".to_string(), Value::array(["b"]));
        let mut stored = BTreeMap::new();
        stored.insert("accounts".to_string(), Value::array(["a", "b"]));

        merge_pushed(&catalog, &def, &mut body, &stored).unwrap();
        assert_eq!(body["accounts"], Value::array(["b", "a"]));
    }

    #[test]
    fn test_hydrate_depth() {
        let catalog = catalog();
        let store = SledStore::open(StorageConfig::temporary()).unwrap();

        let mut account = BTreeMap::new();
        account.insert("name".to_string(), Value::from("savings"));
        store
            .apply(&[WriteOp::Put(Record::new("Account", "acc1", account))])
            .unwrap();

        let mut body = BTreeMap::new();
        body.insert("username".to_string(), Value::from("jose"));
        body.insert("accounts".to_string(), Value::array(["acc1"]));
        body.insert("address".to_string(), Value::object([("city", "Los Angeles"), ("id", "a1")]));

        let hydrator = Hydrator::new(&catalog, &store);
        let loaded = hydrator
            .document(catalog.get("User").unwrap(), "u1", &body, 1)
            .unwrap();
        assert!(loaded.exists());
        assert_eq!(loaded.id(), Some("u1"));
        assert_eq!(loaded.many("accounts").len(), 1);
        assert_eq!(loaded.many("accounts")[0].field("name"), Some(&Value::from("savings")));
        assert_eq!(loaded.one("address").and_then(|a| a.id()), Some("a1"));

        let shallow = hydrator
            .document(catalog.get("User").unwrap(), "u1", &body, 0)
            .unwrap();
        assert!(shallow.many("accounts").is_empty());
        assert_eq!(shallow.unresolved_reference("accounts"), Some(&Value::array(["acc1"])));
        assert_eq!(encode(&shallow)["accounts"], Value::array(["acc1"]));
    }

    #[test]
    fn test_hydrate_projection() {
        let catalog = catalog();
        let store = SledStore::open(StorageConfig::temporary()).unwrap();
        let mut body = BTreeMap::new();
        body.insert("username".to_string(), Value::from("jose"));
        body.insert("address".to_string(), Value::object([("city", "Los Angeles")]));

        let query = QueryDescriptor::new("User").select("username");
        let loaded = Hydrator::new(&catalog, &store)
            .with_projection(&query)
            .document(catalog.get("User").unwrap(), "u1", &body, 1)
            .unwrap();
        assert_eq!(loaded.field("username"), Some(&Value::from("jose")));
        assert!(loaded.one("address").is_none());
        assert!(loaded.is_partial());
        assert!(loaded.unloaded_fields().contains("address"));

        let query = QueryDescriptor::new("User").exclude("username");
        let loaded = Hydrator::new(&catalog, &store)
            .with_projection(&query)
            .document(catalog.get("User").unwrap(), "u1", &body, 1)
            .unwrap();
        assert!(loaded.field("username").is_none());
        assert!(loaded.one("address").is_some());
    }

    #[test]
    fn test_merge_unloaded_keeps_stored_values() {
        let catalog = catalog();
        let store = SledStore::open(StorageConfig::temporary()).unwrap();
        let mut stored = BTreeMap::new();
        stored.insert("username".to_string(), Value::from("jose"));
        stored.insert("address".to_string(), Value::object([("city", "Los Angeles")]));
        stored.insert("accounts".to_string(), Value::array(["acc1"]));

        let query = QueryDescriptor::new("User").select("username");
        let mut loaded = Hydrator::new(&catalog, &store)
            .with_projection(&query)
            .document(catalog.get("User").unwrap(), "u1", &stored, 1)
            .unwrap();
        loaded.set_field("username", "pepe");

        let mut body = encode(&loaded);
        assert_eq!(body["accounts"], Value::array(Vec::<Value>::new()));
        merge_unloaded(&loaded, &mut body, &stored);
        assert_eq!(body["username"], Value::from("pepe"));
        assert_eq!(body["address"], stored["address"]);
        assert_eq!(body["accounts"], Value::array(["acc1"]));
    }
}
