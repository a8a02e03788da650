//! Query options and the descriptor builder.
//!
//! [`QueryBuilder`] turns framework-style [`QueryOptions`] (or an existing
//! descriptor) into a [`QueryDescriptor`], resolving named finders on the
//! way.

use docrecord_proto::{OrderDirection, OrderSpec, Pagination, QueryDescriptor, Value};
use tracing::debug;

use super::conditions;
use super::cursor::Cursor;
use crate::catalog::EntityDef;
use crate::document::{Document, FinderOutcome};
use crate::error::Error;

/// Built-in finder returning a cursor over every match.
pub const FIND_ALL: &str = "all";

/// Built-in finder returning the first match.
pub const FIND_FIRST: &str = "first";

/// Framework-style query options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Conditions keyed `"field"` or `"field operator"`.
    pub conditions: Vec<(String, Value)>,
    /// Projection.
    pub fields: Vec<String>,
    /// Sort entries as `(field, direction)`; the last one wins.
    pub order: Vec<(String, String)>,
    /// Result limit.
    pub limit: Option<u32>,
    /// Explicit number of results to skip.
    pub offset: Option<u32>,
    /// One-based page number.
    pub page: Option<i64>,
    /// Extra arguments for finder hooks.
    pub args: Vec<Value>,
}

impl QueryOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition.
    pub fn condition(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }

    /// Add a projected field.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Add a sort entry.
    pub fn order(mut self, field: impl Into<String>, direction: impl Into<String>) -> Self {
        self.order.push((field.into(), direction.into()));
        self
    }

    /// Set the limit.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set an explicit offset.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set the page.
    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    /// Add a finder argument.
    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Layer `overrides` on top of these options: conditions, fields and
    /// sort entries are appended, scalar settings are replaced when set.
    pub fn merged_with(&self, overrides: QueryOptions) -> QueryOptions {
        let mut merged = self.clone();
        merged.conditions.extend(overrides.conditions);
        merged.fields.extend(overrides.fields);
        merged.order.extend(overrides.order);
        merged.limit = overrides.limit.or(self.limit);
        merged.offset = overrides.offset.or(self.offset);
        merged.page = overrides.page.or(self.page);
        if !overrides.args.is_empty() {
            merged.args = overrides.args;
        }
        merged
    }
}

/// Input of [`QueryBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySource {
    /// Raw options.
    Options(QueryOptions),
    /// An already-built descriptor, merged through.
    Descriptor(QueryDescriptor),
}

impl From<QueryOptions> for QuerySource {
    fn from(options: QueryOptions) -> Self {
        QuerySource::Options(options)
    }
}

impl From<QueryDescriptor> for QuerySource {
    fn from(descriptor: QueryDescriptor) -> Self {
        QuerySource::Descriptor(descriptor)
    }
}

/// How a named finder is resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum FinderScope {
    /// Dispatch to the entity's `find_before` / `find_after` hooks.
    Hook,
    /// Merge an options fragment before translation.
    Options(QueryOptions),
}

/// Result of running a finder.
#[derive(Debug)]
pub enum FindResult<'m> {
    /// A lazy cursor.
    Many(Cursor<'m>),
    /// A single optional document.
    One(Option<Document>),
}

impl<'m> FindResult<'m> {
    /// The cursor, if this is a collection result.
    pub fn into_cursor(self) -> Option<Cursor<'m>> {
        match self {
            FindResult::Many(cursor) => Some(cursor),
            FindResult::One(_) => None,
        }
    }

    /// The document, if this is a single result.
    pub fn into_document(self) -> Option<Document> {
        match self {
            FindResult::One(doc) => doc,
            FindResult::Many(_) => None,
        }
    }
}

/// Builds query descriptors for an entity.
pub struct QueryBuilder<'a> {
    entity: &'a EntityDef,
    finder: String,
    sort_whitelist: Vec<String>,
}

impl<'a> QueryBuilder<'a> {
    /// Create a builder for the `all` finder.
    pub fn new(entity: &'a EntityDef) -> Self {
        Self {
            entity,
            finder: FIND_ALL.to_string(),
            sort_whitelist: Vec::new(),
        }
    }

    /// Use a named finder.
    pub fn with_finder(mut self, finder: impl Into<String>) -> Self {
        self.finder = finder.into();
        self
    }

    /// Only allow sorting by these fields. A sort on any other field drops
    /// the sort entirely.
    pub fn with_sort_whitelist<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort_whitelist = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve the finder's scope. Declared finders shadow the built-ins.
    pub fn scope(&self) -> Result<Option<&'a FinderScope>, Error> {
        if let Some(scope) = self.entity.finders.get(&self.finder) {
            return Ok(Some(scope));
        }
        if self.finder == FIND_ALL || self.finder == FIND_FIRST {
            return Ok(None);
        }
        Err(Error::UnknownFinder {
            entity: self.entity.name.clone(),
            finder: self.finder.clone(),
        })
    }

    /// Build the descriptor.
    ///
    /// Returns `Ok(None)` when the finder's `find_before` hook cancels the
    /// query.
    pub fn build(&self, source: impl Into<QuerySource>) -> Result<Option<QueryDescriptor>, Error> {
        let scope = self.scope()?;

        let mut query = match (source.into(), scope) {
            (QuerySource::Options(options), Some(FinderScope::Options(fragment))) => {
                self.translate(fragment.merged_with(options))
            }
            (QuerySource::Options(options), _) => self.translate(options),
            (QuerySource::Descriptor(descriptor), Some(FinderScope::Options(fragment))) => {
                let mut query = self.translate(fragment.clone());
                query.merge(descriptor);
                query
            }
            (QuerySource::Descriptor(descriptor), _) => self.pass_through(descriptor),
        };

        if let Some(FinderScope::Hook) = scope {
            match self.entity.hooks().find_before(&self.finder, query) {
                FinderOutcome::Continue(extended) => query = extended,
                FinderOutcome::Cancel => {
                    debug!(
                        entity = %self.entity.name,
                        finder = %self.finder,
                        "Query cancelled by find_before"
                    );
                    return Ok(None);
                }
            }
        }

        if self.finder == FIND_FIRST {
            query.pagination.limit = Some(1);
        }

        Ok(Some(query))
    }

    fn translate(&self, options: QueryOptions) -> QueryDescriptor {
        let mut query = QueryDescriptor::new(self.entity.name.as_str());
        query.filters = conditions::translate(&options.conditions, &self.entity.name);

        for field in options.fields {
            query.add_projection(field);
        }

        for (field, direction) in options.order {
            if !self.sort_allowed(&field) {
                debug!(entity = %self.entity.name, field = %field, "Sort field not whitelisted");
                query.order = None;
                break;
            }
            query.order = Some(OrderSpec {
                field,
                direction: OrderDirection::parse_lossy(&direction),
            });
        }

        query.pagination = Pagination::resolve(options.page, options.limit, options.offset);
        query.args = options.args;
        query
    }

    fn pass_through(&self, mut descriptor: QueryDescriptor) -> QueryDescriptor {
        if descriptor.entity.is_empty() {
            descriptor.entity = self.entity.name.clone();
        }
        if descriptor.pagination.page < 1 {
            descriptor.pagination.page = 1;
        }
        if let Some(order) = &descriptor.order {
            if !self.sort_allowed(&order.field) {
                descriptor.order = None;
            }
        }
        descriptor
    }

    fn sort_allowed(&self, field: &str) -> bool {
        self.sort_whitelist.is_empty() || self.sort_whitelist.iter().any(|f| f == field)
    }
}
