//! Query parameters, query-string assembly and list results

use crate::core::filter;
use crate::core::predicate::FilterPredicate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire names of the query-string clauses
pub const FILTER_KEY: &str = "$filter";
pub const ORDER_BY_KEY: &str = "$orderby";
pub const COUNT_KEY: &str = "$count";
pub const TOP_KEY: &str = "$top";
pub const SKIP_KEY: &str = "$skip";

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// A single sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// `$orderby` value, e.g. `createdAt desc`
    pub fn to_wire(&self) -> String {
        format!("{} {}", self.field, self.direction.as_str())
    }
}

/// Page number and size (both at least 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page_number: usize,
    page_size: usize,
}

impl PageRequest {
    /// Create a page request, raising zero values to 1
    pub fn new(page_number: usize, page_size: usize) -> Self {
        Self {
            page_number: page_number.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Page number (starts at 1)
    pub fn page_number(&self) -> usize {
        self.page_number
    }

    /// Number of items per page
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Index of the first item of the page, saturating past `usize::MAX`
    pub fn offset(&self) -> usize {
        (self.page_number - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// Ordered `key=value` pairs of a list request
///
/// `Display` renders the unencoded `k=v&k=v` form; transports encode the
/// pairs themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString {
    pairs: Vec<(String, String)>,
}

impl QueryString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> Vec<&str> {
        self.pairs.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for QueryString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// Combine filter, sort, count flag and paging into a query string
///
/// Clause order is always filter, sort, count, size, offset. Absent parts
/// emit nothing: an empty filter expression omits `$filter`, and page 1
/// never emits `$skip`.
pub fn assemble(
    filter_expr: &str,
    sort: Option<&SortSpec>,
    page: Option<&PageRequest>,
    count: bool,
) -> QueryString {
    let mut query = QueryString::new();

    if !filter_expr.is_empty() {
        query.push(FILTER_KEY, filter_expr);
    }
    if let Some(sort) = sort {
        query.push(ORDER_BY_KEY, sort.to_wire());
    }
    if count {
        query.push(COUNT_KEY, "true");
    }
    if let Some(page) = page {
        query.push(TOP_KEY, page.page_size().to_string());
        if page.page_number() > 1 {
            query.push(SKIP_KEY, page.offset().to_string());
        }
    }

    query
}

/// Everything needed to issue one list request
///
/// Built fresh per query; setters return `Self` for chaining.
///
/// # Example
/// ```rust,ignore
/// let query = ListQuery::new()
///     .search(&term, ["title", "content", "email"])
///     .filter(FilterPredicate::equals("status", Literal::enumeration("OPEN")))
///     .sort_by(SortSpec::desc("createdAt"))
///     .page(2, 10)
///     .with_count();
/// // $filter=...&$orderby=createdAt desc&$count=true&$top=10&$skip=10
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub predicates: Vec<FilterPredicate>,
    pub sort: Option<SortSpec>,
    pub page: Option<PageRequest>,
    pub count: bool,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: FilterPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn search<I, F>(self, term: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.filter(FilterPredicate::search(term, fields))
    }

    /// Set the sort key, replacing any earlier one
    pub fn sort_by(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn page(mut self, page_number: usize, page_size: usize) -> Self {
        self.page = Some(PageRequest::new(page_number, page_size));
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// `$filter` expression for the current predicates (may be empty)
    pub fn filter_expression(&self) -> String {
        filter::build(&self.predicates)
    }

    /// True when at least one predicate constrains the result
    pub fn has_active_filter(&self) -> bool {
        !self.filter_expression().is_empty()
    }

    pub fn to_query_string(&self) -> QueryString {
        assemble(
            &self.filter_expression(),
            self.sort.as_ref(),
            self.page.as_ref(),
            self.count,
        )
    }
}

/// A page of items plus the size of the whole filtered collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    pub total_count: usize,
}

impl<T> ListResult<T> {
    pub fn new(items: Vec<T>, total_count: usize) -> Self {
        Self { items, total_count }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
        }
    }

    /// A legitimately empty result (not an error state)
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListResult<U> {
        ListResult {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
        }
    }

    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<ListResult<U>, E> {
        Ok(ListResult {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            total_count: self.total_count,
        })
    }

    /// Pagination metadata for this result under `page`
    pub fn pagination(&self, page: &PageRequest) -> PaginationMeta {
        PaginationMeta::new(page.page_number(), page.page_size(), self.total_count)
    }
}

impl<T> Default for ListResult<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    /// Current page number (starts at 1)
    pub page: usize,

    /// Number of items per page
    pub limit: usize,

    /// Total number of items (after filters)
    pub total: usize,

    /// Total number of pages
    pub total_pages: usize,

    /// Whether there is a next page
    pub has_next: bool,

    /// Whether there is a previous page
    pub has_prev: bool,
}

impl PaginationMeta {
    /// Create pagination metadata from calculation
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        // Ensure limit is at least 1 to avoid division by zero
        let limit = limit.max(1);
        let page = page.max(1);
        let total_pages = if total == 0 { 0 } else { total.div_ceil(limit) };
        let start = (page - 1).saturating_mul(limit);

        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: start.saturating_add(limit) < total,
            has_prev: page > 1,
        }
    }
}
