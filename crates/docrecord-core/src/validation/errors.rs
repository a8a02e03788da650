//! Accumulated validation errors.

use std::collections::BTreeMap;

/// Errors recorded for one key of a [`ValidationErrors`] map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorEntry {
    /// Messages for a plain field.
    Messages(Vec<String>),
    /// Errors of a single associated document, keyed by its alias.
    Nested(ValidationErrors),
    /// Errors of associated documents in a collection, keyed by input index.
    Many(BTreeMap<usize, ValidationErrors>),
}

/// Field-addressable validation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    entries: BTreeMap<String, ErrorEntry>,
}

impl ValidationErrors {
    /// Create an empty error map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let message = message.into();
        match self.entries.entry(field.into()) {
            std::collections::btree_map::Entry::Occupied(mut slot) => match slot.get_mut() {
                ErrorEntry::Messages(messages) => messages.push(message),
                other => *other = ErrorEntry::Messages(vec![message]),
            },
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(ErrorEntry::Messages(vec![message]));
            }
        }
    }

    /// Nest an associated document's errors under its alias.
    ///
    /// Empty error maps are not recorded.
    pub fn nest(&mut self, alias: impl Into<String>, errors: ValidationErrors) {
        if errors.is_empty() {
            return;
        }
        self.entries.insert(alias.into(), ErrorEntry::Nested(errors));
    }

    /// Nest a collection element's errors under `[alias][index]`.
    pub fn nest_at(&mut self, alias: impl Into<String>, index: usize, errors: ValidationErrors) {
        if errors.is_empty() {
            return;
        }
        let entry = self
            .entries
            .entry(alias.into())
            .or_insert_with(|| ErrorEntry::Many(BTreeMap::new()));
        match entry {
            ErrorEntry::Many(children) => {
                children.insert(index, errors);
            }
            other => {
                let mut children = BTreeMap::new();
                children.insert(index, errors);
                *other = ErrorEntry::Many(children);
            }
        }
    }

    /// Remove everything recorded for a key.
    pub fn clear_field(&mut self, field: &str) {
        self.entries.remove(field);
    }

    /// Remove all errors.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entry for a key.
    pub fn get(&self, field: &str) -> Option<&ErrorEntry> {
        self.entries.get(field)
    }

    /// Messages recorded for a plain field.
    pub fn messages(&self, field: &str) -> Option<&[String]> {
        match self.entries.get(field) {
            Some(ErrorEntry::Messages(messages)) => Some(messages),
            _ => None,
        }
    }

    /// Errors nested under a single-association alias.
    pub fn nested(&self, alias: &str) -> Option<&ValidationErrors> {
        match self.entries.get(alias) {
            Some(ErrorEntry::Nested(errors)) => Some(errors),
            _ => None,
        }
    }

    /// Errors nested under a collection alias at an index.
    pub fn nested_at(&self, alias: &str, index: usize) -> Option<&ValidationErrors> {
        match self.entries.get(alias) {
            Some(ErrorEntry::Many(children)) => children.get(&index),
            _ => None,
        }
    }

    /// Check if a key has errors.
    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    /// Check if there are no errors.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys with errors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over keys and their entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ErrorEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
