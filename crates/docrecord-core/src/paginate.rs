//! Page-oriented listing.
//!
//! The [`Paginator`] merges request parameters with per-listing defaults,
//! checks the sort against a whitelist, runs the `all` finder and reports
//! paging metadata alongside the cursor.

use docrecord_proto::{OrderDirection, OrderSpec, Value};

use crate::error::Error;
use crate::manager::DocumentManager;
use crate::query::{Cursor, FindResult, QueryOptions, FIND_ALL};

/// Listing defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatorConfig {
    /// Page size used when the request has none.
    pub limit: u32,
    /// Upper bound for requested page sizes.
    pub max_limit: u32,
    /// Sort used when the request has none, as `(field, direction)`.
    pub order: Option<(String, String)>,
    /// Conditions applied to every page.
    pub conditions: Vec<(String, Value)>,
    /// Projection applied to every page.
    pub fields: Vec<String>,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            limit: 20,
            max_limit: 100,
            order: None,
            conditions: Vec::new(),
            fields: Vec::new(),
        }
    }
}

impl PaginatorConfig {
    /// Set the default page size.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the page size bound.
    pub fn with_max_limit(mut self, max_limit: u32) -> Self {
        self.max_limit = max_limit;
        self
    }

    /// Set the default sort.
    pub fn with_order(mut self, field: impl Into<String>, direction: impl Into<String>) -> Self {
        self.order = Some((field.into(), direction.into()));
        self
    }

    /// Add a default condition.
    pub fn with_condition(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }

    /// Add a projected field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }
}

/// Parameters of one page request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    /// Requested page. Missing or below one means the first page.
    pub page: Option<i64>,
    /// Requested page size.
    pub limit: Option<u32>,
    /// Requested sort field.
    pub sort: Option<String>,
    /// Requested sort direction. Anything but `asc`/`desc` means `asc`.
    pub direction: Option<String>,
    /// Extra conditions, merged over the defaults.
    pub scope: Vec<(String, Value)>,
}

impl PageRequest {
    /// Request the first page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a page.
    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    /// Request a page size.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Request a sort.
    pub fn sort(mut self, field: impl Into<String>, direction: impl Into<String>) -> Self {
        self.sort = Some(field.into());
        self.direction = Some(direction.into());
        self
    }

    /// Add a scope condition.
    pub fn scope(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.scope.push((key.into(), value.into()));
        self
    }
}

/// Paging metadata for a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PagingInfo {
    /// Page number, at least one.
    pub page: u32,
    /// Number of documents on this page.
    pub current: usize,
    /// Number of documents matched across all pages.
    pub count: usize,
    /// A previous page exists.
    pub prev_page: bool,
    /// A next page exists.
    pub next_page: bool,
    /// Total number of pages.
    pub page_count: usize,
    /// Effective sort, if any survived validation.
    pub order: Option<OrderSpec>,
    /// Effective page size.
    pub limit: u32,
}

/// One page of results.
#[derive(Debug)]
pub struct Page<'m> {
    /// Cursor over the page's documents.
    pub cursor: Cursor<'m>,
    /// Paging metadata.
    pub paging: PagingInfo,
}

/// Builds pages for an entity listing.
#[derive(Debug, Clone, Default)]
pub struct Paginator {
    config: PaginatorConfig,
}

impl Paginator {
    /// Create a paginator with the given defaults.
    pub fn new(config: PaginatorConfig) -> Self {
        Self { config }
    }

    /// The listing defaults.
    pub fn config(&self) -> &PaginatorConfig {
        &self.config
    }

    /// Fetch one page.
    ///
    /// A sort on a field outside a non-empty `whitelist` is dropped. The page
    /// size is clamped to `1..=max_limit`.
    pub fn paginate<'m>(
        &self,
        manager: &'m DocumentManager,
        entity: &str,
        request: &PageRequest,
        whitelist: &[&str],
    ) -> Result<Page<'m>, Error> {
        let limit = request
            .limit
            .unwrap_or(self.config.limit)
            .clamp(1, self.config.max_limit.max(1));
        let page = match request.page {
            Some(p) if p >= 1 => u32::try_from(p).unwrap_or(u32::MAX),
            _ => 1,
        };

        let order = self.validate_sort(request, whitelist);

        let mut options = QueryOptions::new().limit(limit).page(i64::from(page));
        options.conditions = self.config.conditions.clone();
        options.conditions.extend(request.scope.iter().cloned());
        options.fields = self.config.fields.clone();
        if let Some(order) = &order {
            options = options.order(order.field.clone(), order.direction.as_str());
        }

        let mut cursor = match manager.find(entity, FIND_ALL, options)? {
            Some(FindResult::Many(cursor)) => cursor,
            Some(FindResult::One(_)) | None => {
                return Err(Error::InvalidData(format!(
                    "listing of {entity} did not produce a cursor"
                )))
            }
        };

        let current = cursor.count(false)?;
        let count = cursor.count(true)?;
        let limit_usize = limit as usize;

        let paging = PagingInfo {
            page,
            current,
            count,
            prev_page: page > 1,
            next_page: count > page as usize * limit_usize,
            page_count: count.div_ceil(limit_usize),
            order,
            limit,
        };

        Ok(Page { cursor, paging })
    }

    fn validate_sort(&self, request: &PageRequest, whitelist: &[&str]) -> Option<OrderSpec> {
        let (field, direction) = match (&request.sort, &self.config.order) {
            (Some(field), _) => (field.clone(), request.direction.clone().unwrap_or_default()),
            (None, Some((field, direction))) => (field.clone(), direction.clone()),
            (None, None) => return None,
        };

        if !whitelist.is_empty() && !whitelist.contains(&field.as_str()) {
            return None;
        }

        Some(OrderSpec {
            field,
            direction: OrderDirection::parse_lossy(&direction),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_validation() {
        let paginator = Paginator::new(PaginatorConfig::default().with_order("created", "desc"));

        let request = PageRequest::new().sort("salary", "SIDEWAYS");
        assert_eq!(paginator.validate_sort(&request, &[]), Some(OrderSpec::asc("salary")));
        assert_eq!(paginator.validate_sort(&request, &["username"]), None);

        let request = PageRequest::new();
        assert_eq!(paginator.validate_sort(&request, &[]), Some(OrderSpec::desc("created")));
    }

    #[test]
    fn test_config_defaults() {
        let config = PaginatorConfig::default();
        assert_eq!(config.limit, 20);
        assert_eq!(config.max_limit, 100);
        assert!(config.order.is_none());
    }
}
