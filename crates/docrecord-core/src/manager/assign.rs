//! Bulk assignment of nested data onto documents.

use std::collections::BTreeMap;
use std::sync::Arc;

use docrecord_proto::Value;
use tracing::debug;

use super::DocumentManager;
use crate::catalog::{AssociationDef, EntityDef};
use crate::document::Document;
use crate::error::Error;
use crate::validation::ValidationErrors;

impl DocumentManager {
    /// Bulk-assign data onto a document.
    ///
    /// `data` is either grouped by name (`{"User": {...}, "PhoneNumber":
    /// [...]}`) or flat (`{"username": ...}`); in the flat form keys naming
    /// an association alias are still treated as association groups. The
    /// identifier and association-backed fields are never assigned directly,
    /// unknown fields are ignored and every reassigned field loses its
    /// previous validation error.
    ///
    /// With `cascade`, referenced children touched by the assignment are
    /// saved as they are assigned.
    pub fn set(&self, doc: &mut Document, data: &Value, cascade: bool) -> Result<(), Error> {
        let Value::Object(data) = data else {
            return Err(Error::InvalidData(format!(
                "cannot assign {} to {}",
                data.type_name(),
                doc.entity_name()
            )));
        };
        let def = Arc::clone(doc.definition());

        let own = match data.get(&def.name) {
            Some(Value::Object(own)) => Some(own),
            Some(_) => None,
            None => Some(data),
        };
        if let Some(own) = own {
            assign_fields(doc, &def, own);
        }

        for (name, value) in data {
            let Some(association) = def.association_by_alias(name) else {
                continue;
            };
            if association.is_many() {
                self.assign_many(doc, association, value, cascade)?;
            } else {
                self.assign_one(doc, association, value, cascade)?;
            }
        }
        Ok(())
    }

    fn assign_one(
        &self,
        doc: &mut Document,
        association: &AssociationDef,
        value: &Value,
        cascade: bool,
    ) -> Result<(), Error> {
        let field = association.field.as_str();
        let alias = association.alias();

        let data = match value {
            Value::Object(_) => value,
            Value::Null => {
                doc.clear_association(field)?;
                doc.errors_mut().clear_field(alias);
                return Ok(());
            }
            other => {
                debug!(
                    entity = %doc.entity_name(),
                    alias,
                    found = other.type_name(),
                    "Association data is not an object, ignored"
                );
                return Ok(());
            }
        };

        if doc.one(field).is_none() {
            let target = self.catalog.get(&association.target)?;
            doc.set_one(field, Document::new(target))?;
        }
        let Some(child) = doc.one_mut(field) else {
            return Err(Error::InvalidOffset {
                entity: association.target.clone(),
                offset: field.to_string(),
            });
        };

        self.set(child, data, cascade)?;
        if cascade && association.kind.is_reference() {
            self.save(child, None, true)?;
        }
        let child_errors = child.errors().clone();

        let errors = doc.errors_mut();
        errors.clear_field(alias);
        errors.nest(alias, child_errors);
        Ok(())
    }

    /// Entries carrying an identifier edit the child with that identifier.
    /// Entries without one edit the child at the same position when that
    /// child has no identifier either, and are appended otherwise. Children
    /// touched by the input come first, in input order, followed by the
    /// untouched ones.
    fn assign_many(
        &self,
        doc: &mut Document,
        association: &AssociationDef,
        value: &Value,
        cascade: bool,
    ) -> Result<(), Error> {
        let field = association.field.as_str();
        let alias = association.alias();
        let entries = indexed_entries(doc.entity_name(), alias, value);
        let target = self.catalog.get(&association.target)?;

        let Some(collection) = doc.many_mut(field) else {
            return Err(Error::InvalidOffset {
                entity: target.name.clone(),
                offset: field.to_string(),
            });
        };
        let mut existing: Vec<Option<Box<Document>>> =
            std::mem::take(collection).into_iter().map(Some).collect();

        let mut assigned = Vec::with_capacity(entries.len() + existing.len());
        let mut child_errors: Vec<(usize, ValidationErrors)> = Vec::new();

        for (index, entry) in entries {
            let slot = match entry_id(entry, &target) {
                Some(id) => existing
                    .iter()
                    .position(|c| c.as_ref().is_some_and(|c| c.id() == Some(id.as_str()))),
                None => existing
                    .get(index)
                    .and_then(Option::as_ref)
                    .filter(|c| c.id().is_none())
                    .map(|_| index),
            };

            let mut child = match slot.and_then(|i| existing[i].take()) {
                Some(child) => child,
                None => Box::new(Document::new(Arc::clone(&target))),
            };

            let result = self.set(&mut child, entry, cascade).and_then(|()| {
                if cascade && association.kind.is_reference() {
                    self.save(&mut child, None, true).map(|_| ())
                } else {
                    Ok(())
                }
            });
            child_errors.push((index, child.errors().clone()));
            assigned.push(child);

            if let Err(e) = result {
                assigned.extend(existing.into_iter().flatten());
                restore(doc, field, assigned);
                return Err(e);
            }
        }

        assigned.extend(existing.into_iter().flatten());
        restore(doc, field, assigned);

        let errors = doc.errors_mut();
        errors.clear_field(alias);
        for (index, child) in child_errors {
            errors.nest_at(alias, index, child);
        }
        Ok(())
    }
}

fn restore(doc: &mut Document, field: &str, children: Vec<Box<Document>>) {
    if let Some(collection) = doc.many_mut(field) {
        *collection = children;
    }
}

fn assign_fields(doc: &mut Document, def: &EntityDef, data: &BTreeMap<String, Value>) {
    for (name, value) in data {
        if *name == def.identity_field || def.is_association_field(name) {
            continue;
        }
        if def.association_by_alias(name).is_some() {
            continue;
        }

        let setter = def.setter(name);
        if setter.is_none() && def.get_field(name).is_none() {
            debug!(entity = %def.name, field = %name, "Unknown field ignored");
            continue;
        }

        doc.errors_mut().clear_field(name);
        match (setter, def.get_field(name)) {
            (Some(setter), _) => setter(doc, value.clone()),
            (None, Some(field)) => doc.set_field(name.clone(), field.field_type.coerce(value.clone())),
            (None, None) => {}
        }
    }
}

/// Entries of a collection assignment ordered by index: arrays by position,
/// objects by their numeric keys.
fn indexed_entries<'v>(entity: &str, alias: &str, value: &'v Value) -> Vec<(usize, &'v Value)> {
    let mut entries: Vec<(usize, &Value)> = match value {
        Value::Array(items) => items.iter().enumerate().collect(),
        Value::Object(items) => items
            .iter()
            .filter_map(|(key, entry)| match key.parse::<usize>() {
                Ok(index) => Some((index, entry)),
                Err(_) => {
                    debug!(entity, alias, key = %key, "Non-numeric collection key ignored");
                    None
                }
            })
            .collect(),
        other => {
            debug!(entity, alias, found = other.type_name(), "Collection data ignored");
            Vec::new()
        }
    };
    entries.retain(|(_, entry)| entry.is_object());
    entries.sort_by_key(|(index, _)| *index);
    entries
}

fn entry_id(entry: &Value, target: &EntityDef) -> Option<String> {
    match entry.get(&target.identity_field)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Int32(id) => Some(id.to_string()),
        Value::Int64(id) => Some(id.to_string()),
        _ => None,
    }
}
