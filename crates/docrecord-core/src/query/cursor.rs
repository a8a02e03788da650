//! Lazy result cursor.

use std::fmt;

use docrecord_proto::{FilterExpr, OrderDirection, OrderSpec, QueryDescriptor, Value};

use crate::document::Document;
use crate::error::Error;
use crate::manager::DocumentManager;

/// A lazily executed query.
///
/// Nothing runs until the first `count`, `single_result`, `to_vec` or `iter`.
/// Results are cached; any builder call marks the cursor dirty so the next
/// access executes again.
pub struct Cursor<'m> {
    manager: &'m DocumentManager,
    query: QueryDescriptor,
    results: Option<Vec<Document>>,
    dirty: bool,
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("query", &self.query)
            .field("loaded", &self.results.as_ref().map(Vec::len))
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl<'m> Cursor<'m> {
    /// Wrap a descriptor.
    pub fn new(manager: &'m DocumentManager, query: QueryDescriptor) -> Self {
        Self {
            manager,
            query,
            results: None,
            dirty: true,
        }
    }

    /// The descriptor this cursor runs.
    pub fn query(&self) -> &QueryDescriptor {
        &self.query
    }

    /// Check if the next access will execute the query.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Add a predicate.
    pub fn filter(&mut self, filter: FilterExpr) -> &mut Self {
        self.query.filters.push(filter);
        self.touch()
    }

    /// Add an equality predicate.
    pub fn field_eq(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.filter(FilterExpr::eq(field, value))
    }

    /// Match documents whose reference field points at `doc`.
    ///
    /// Works for single references and, through array matching, for
    /// reference collections.
    pub fn references(&mut self, field: impl Into<String>, doc: &Document) -> &mut Self {
        let id = doc.id().map(Value::from).unwrap_or(Value::Null);
        self.filter(FilterExpr::eq(field, id))
    }

    /// Match documents where `field` is present, or absent when `exists` is
    /// false.
    pub fn exists(&mut self, field: impl Into<String>, exists: bool) -> &mut Self {
        self.filter(FilterExpr::exists(field, exists))
    }

    /// Add a branch to the cursor's disjunction. The first call creates it;
    /// later calls widen it.
    pub fn add_or(&mut self, branch: FilterExpr) -> &mut Self {
        let existing = self.query.filters.iter_mut().find_map(|f| match f {
            FilterExpr::Or(branches) => Some(branches),
            _ => None,
        });
        match existing {
            Some(branches) => branches.push(branch),
            None => self.query.filters.push(FilterExpr::or(vec![branch])),
        }
        self.touch()
    }

    /// Match documents where an element of the array `field` satisfies every
    /// predicate in `filters`.
    pub fn elem_match(&mut self, field: impl Into<String>, filters: Vec<FilterExpr>) -> &mut Self {
        self.filter(FilterExpr::elem_match(field, filters))
    }

    /// Match documents that do not satisfy `filter`.
    pub fn not(&mut self, filter: FilterExpr) -> &mut Self {
        self.filter(FilterExpr::not(filter))
    }

    /// Add a projected field.
    pub fn select(&mut self, field: impl Into<String>) -> &mut Self {
        self.query.add_projection(field);
        self.touch()
    }

    /// Leave a field out of the results.
    pub fn exclude(&mut self, field: impl Into<String>) -> &mut Self {
        self.query.add_exclusion(field);
        self.touch()
    }

    /// Replace the sort key.
    pub fn sort(&mut self, field: impl Into<String>, direction: OrderDirection) -> &mut Self {
        self.query.order = Some(OrderSpec {
            field: field.into(),
            direction,
        });
        self.touch()
    }

    /// Set the limit.
    pub fn limit(&mut self, limit: u32) -> &mut Self {
        self.query.pagination.limit = Some(limit);
        self.touch()
    }

    /// Set the number of results to skip.
    pub fn skip(&mut self, skip: u32) -> &mut Self {
        self.query.pagination.skip = Some(skip);
        self.touch()
    }

    /// Count results.
    ///
    /// With `exclude_skip_limit` the count covers every document matched by
    /// the filter; otherwise it covers the current page only.
    pub fn count(&mut self, exclude_skip_limit: bool) -> Result<usize, Error> {
        if exclude_skip_limit {
            return self.manager.count_matching(&self.query);
        }
        Ok(self.load()?.len())
    }

    /// Run with a limit of one and return the match, if any.
    pub fn single_result(&mut self) -> Result<Option<Document>, Error> {
        self.limit(1);
        Ok(self.load()?.first().cloned())
    }

    /// Materialize the results.
    pub fn to_vec(&mut self) -> Result<Vec<Document>, Error> {
        Ok(self.load()?.to_vec())
    }

    /// Iterate over the results.
    pub fn iter(&mut self) -> Result<std::slice::Iter<'_, Document>, Error> {
        Ok(self.load()?.iter())
    }

    /// Consume the cursor, returning its results.
    pub fn into_vec(mut self) -> Result<Vec<Document>, Error> {
        self.load()?;
        Ok(self.results.take().unwrap_or_default())
    }

    fn touch(&mut self) -> &mut Self {
        self.dirty = true;
        self
    }

    fn load(&mut self) -> Result<&[Document], Error> {
        if self.dirty || self.results.is_none() {
            let results = self.manager.execute(&self.query)?;
            self.results = Some(results);
            self.dirty = false;
        }
        Ok(self.results.as_deref().unwrap_or_default())
    }
}
