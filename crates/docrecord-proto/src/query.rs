//! Query descriptor types.
//!
//! A [`QueryDescriptor`] is the resolved, engine-neutral representation of a
//! find request: a conjunctive list of [`FilterExpr`] predicates, a
//! projection (inclusion or exclusion), a single sort key and pagination.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::value::Value;

/// A native filter predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterExpr {
    /// Field equals value.
    Eq { field: String, value: Value },
    /// Field not equals value.
    Ne { field: String, value: Value },
    /// Field less than value.
    Lt { field: String, value: Value },
    /// Field less than or equal to value.
    Le { field: String, value: Value },
    /// Field greater than value.
    Gt { field: String, value: Value },
    /// Field greater than or equal to value.
    Ge { field: String, value: Value },
    /// Field is in a set of values.
    In { field: String, values: Vec<Value> },
    /// Field is not in a set of values.
    NotIn { field: String, values: Vec<Value> },
    /// Field lies in the inclusive range `[low, high]`.
    Range { field: String, low: Value, high: Value },
    /// Array field has exactly `size` elements.
    Size { field: String, size: i64 },
    /// Field value has the named type.
    Type { field: String, type_name: String },
    /// Array field contains all of the values.
    All { field: String, values: Vec<Value> },
    /// Numeric field satisfies `field % divisor == remainder`.
    Mod {
        field: String,
        divisor: i64,
        remainder: i64,
    },
    /// Field is present (`exists == true`) or absent.
    Exists { field: String, exists: bool },
    /// Some element of an array field matches every nested predicate.
    ElemMatch {
        field: String,
        filters: Vec<FilterExpr>,
    },
    /// At least one branch matches.
    Or(Vec<FilterExpr>),
    /// The inner predicate does not match.
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a not-equal filter.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a less-than filter.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a less-than-or-equal filter.
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Le {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a greater-than filter.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Gt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a greater-than-or-equal filter.
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Ge {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create an IN filter.
    pub fn in_values(field: impl Into<String>, values: Vec<Value>) -> Self {
        FilterExpr::In {
            field: field.into(),
            values,
        }
    }

    /// Create a NOT IN filter.
    pub fn not_in_values(field: impl Into<String>, values: Vec<Value>) -> Self {
        FilterExpr::NotIn {
            field: field.into(),
            values,
        }
    }

    /// Create an inclusive range filter.
    pub fn range(field: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        FilterExpr::Range {
            field: field.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    /// Create an array size filter.
    pub fn size(field: impl Into<String>, size: i64) -> Self {
        FilterExpr::Size {
            field: field.into(),
            size,
        }
    }

    /// Create a type filter.
    pub fn type_of(field: impl Into<String>, type_name: impl Into<String>) -> Self {
        FilterExpr::Type {
            field: field.into(),
            type_name: type_name.into(),
        }
    }

    /// Create an "all of" filter.
    pub fn all(field: impl Into<String>, values: Vec<Value>) -> Self {
        FilterExpr::All {
            field: field.into(),
            values,
        }
    }

    /// Create a modulo filter.
    pub fn modulo(field: impl Into<String>, divisor: i64, remainder: i64) -> Self {
        FilterExpr::Mod {
            field: field.into(),
            divisor,
            remainder,
        }
    }

    /// Create an existence filter.
    pub fn exists(field: impl Into<String>, exists: bool) -> Self {
        FilterExpr::Exists {
            field: field.into(),
            exists,
        }
    }

    /// Create an element match filter. Nested predicates address fields of
    /// the array element.
    pub fn elem_match(field: impl Into<String>, filters: Vec<FilterExpr>) -> Self {
        FilterExpr::ElemMatch {
            field: field.into(),
            filters,
        }
    }

    /// Create a disjunction.
    pub fn or(branches: Vec<FilterExpr>) -> Self {
        FilterExpr::Or(branches)
    }

    /// Negate a predicate.
    pub fn not(inner: FilterExpr) -> Self {
        FilterExpr::Not(Box::new(inner))
    }

    /// The field this predicate applies to. `None` for `Or` and `Not`.
    pub fn field(&self) -> Option<&str> {
        match self {
            FilterExpr::Eq { field, .. }
            | FilterExpr::Ne { field, .. }
            | FilterExpr::Lt { field, .. }
            | FilterExpr::Le { field, .. }
            | FilterExpr::Gt { field, .. }
            | FilterExpr::Ge { field, .. }
            | FilterExpr::In { field, .. }
            | FilterExpr::NotIn { field, .. }
            | FilterExpr::Range { field, .. }
            | FilterExpr::Size { field, .. }
            | FilterExpr::Type { field, .. }
            | FilterExpr::All { field, .. }
            | FilterExpr::Mod { field, .. }
            | FilterExpr::Exists { field, .. }
            | FilterExpr::ElemMatch { field, .. } => Some(field),
            FilterExpr::Or(_) | FilterExpr::Not(_) => None,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl OrderDirection {
    /// Parse a direction, treating anything other than `desc` as ascending.
    pub fn parse_lossy(direction: &str) -> Self {
        if direction.trim().eq_ignore_ascii_case("desc") {
            OrderDirection::Desc
        } else {
            OrderDirection::Asc
        }
    }

    /// Lowercase name of the direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }
}

/// Order specification for sorting results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Field to order by.
    pub field: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Create an ascending order spec.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order spec.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// Resolved pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// One-based page number, never below 1.
    pub page: u32,
    /// Maximum number of results to return.
    pub limit: Option<u32>,
    /// Number of results to skip.
    pub skip: Option<u32>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: None,
            skip: None,
        }
    }
}

impl Pagination {
    /// Resolve page/limit/offset options.
    ///
    /// The page is coerced to at least 1. An explicit offset wins; otherwise
    /// the skip is derived as `(page - 1) * limit` when a limit is set and the
    /// page is past the first.
    pub fn resolve(page: Option<i64>, limit: Option<u32>, offset: Option<u32>) -> Self {
        let page = match page {
            Some(p) if p >= 1 => u32::try_from(p).unwrap_or(u32::MAX),
            _ => 1,
        };

        let skip = match (offset, limit) {
            (Some(offset), _) => Some(offset),
            (None, Some(limit)) if page > 1 => Some((page - 1).saturating_mul(limit)),
            _ => None,
        };

        Self { page, limit, skip }
    }

    /// Skip as a plain count (0 when unset).
    pub fn skip_count(&self) -> usize {
        self.skip.unwrap_or(0) as usize
    }
}

/// An engine-neutral find request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Entity type being queried.
    pub entity: String,
    /// Conjunctive filter predicates.
    pub filters: Vec<FilterExpr>,
    /// Projection inclusion list. Empty means every field.
    pub projection: Vec<String>,
    /// Fields left out of the results. Applied after the inclusion list.
    #[serde(default)]
    pub exclusion: Vec<String>,
    /// Sort key. Assigning a new one replaces the previous.
    pub order: Option<OrderSpec>,
    /// Pagination.
    pub pagination: Pagination,
    /// Extra arguments handed to finder hooks.
    pub args: Vec<Value>,
}

impl QueryDescriptor {
    /// Create an empty descriptor for an entity.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            filters: Vec::new(),
            projection: Vec::new(),
            exclusion: Vec::new(),
            order: None,
            pagination: Pagination::default(),
            args: Vec::new(),
        }
    }

    /// Add a filter predicate.
    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add a field to the projection.
    pub fn select(mut self, field: impl Into<String>) -> Self {
        self.add_projection(field);
        self
    }

    /// Leave a field out of the results.
    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.add_exclusion(field);
        self
    }

    /// Set the sort key, replacing any previous one.
    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order = Some(order);
        self
    }

    /// Set pagination.
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Set the result limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.pagination.limit = Some(limit);
        self
    }

    /// Add a field to the projection in place, ignoring duplicates.
    pub fn add_projection(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.projection.contains(&field) {
            self.projection.push(field);
        }
    }

    /// Add a field to the exclusion list in place, ignoring duplicates.
    pub fn add_exclusion(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.exclusion.contains(&field) {
            self.exclusion.push(field);
        }
    }

    /// Check if a top-level field survives the projection.
    pub fn is_projected(&self, field: &str) -> bool {
        (self.projection.is_empty() || self.projection.iter().any(|p| p == field))
            && !self.exclusion.iter().any(|e| e == field)
    }

    /// Merge another descriptor into this one.
    ///
    /// Filters are appended, projections and exclusions unioned; the other descriptor's sort,
    /// limit, skip and args replace ours when present.
    pub fn merge(&mut self, other: QueryDescriptor) {
        self.filters.extend(other.filters);
        for field in other.projection {
            self.add_projection(field);
        }
        for field in other.exclusion {
            self.add_exclusion(field);
        }
        if other.order.is_some() {
            self.order = other.order;
        }
        if other.pagination.limit.is_some() {
            self.pagination.limit = other.pagination.limit;
        }
        if other.pagination.skip.is_some() {
            self.pagination.skip = other.pagination.skip;
        }
        if other.pagination.page > 1 {
            self.pagination.page = other.pagination.page;
        }
        if !other.args.is_empty() {
            self.args = other.args;
        }
    }

    /// Encode the descriptor as JSON (used by the query log).
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a descriptor from JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))
    }
}
