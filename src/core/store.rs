//! Store traits for filtering and sorting

use crate::core::fallback;
use crate::core::field::Record;
use crate::core::predicate::FilterPredicate;
use crate::core::query::{ListQuery, ListResult, SortSpec};
use indexmap::IndexMap;

/// Trait for in-memory collections that answer list queries themselves
///
/// Only `list_all` is required; the query steps default to the fallback
/// engine so every store shares one set of semantics.
pub trait QueryableStore<T: Record + Clone>: Send + Sync {
    /// Get all records (unfiltered, in their stored order)
    fn list_all(&self) -> Vec<T>;

    /// Apply filters to a collection of records
    fn apply_filters(&self, data: Vec<T>, predicates: &[FilterPredicate]) -> Vec<T> {
        fallback::apply_filters(&data, predicates)
    }

    /// Apply sorting to a collection of records
    fn apply_sort(&self, data: Vec<T>, sort: &SortSpec) -> Vec<T> {
        fallback::apply_sort(data, sort)
    }

    /// Filter, sort and page the whole collection through
    /// [`apply_filters`](Self::apply_filters) and [`apply_sort`](Self::apply_sort)
    fn query(&self, query: &ListQuery) -> ListResult<T> {
        let matching = self.apply_filters(self.list_all(), &query.predicates);
        let total_count = matching.len();
        let ordered = match &query.sort {
            Some(sort) => self.apply_sort(matching, sort),
            None => matching,
        };
        let items = match &query.page {
            Some(page) => fallback::slice(ordered, page.offset(), Some(page.page_size())),
            None => ordered,
        };
        ListResult::new(items, total_count)
    }

    /// Number of records per distinct value of `field`, in first-seen order
    ///
    /// Records without the field are counted under `"null"`.
    fn count_by(&self, field: &str) -> IndexMap<String, usize> {
        let mut counts = IndexMap::new();
        for record in self.list_all() {
            let key = record
                .field_value(field)
                .map(|v| v.group_key())
                .unwrap_or_else(|| "null".to_string());
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }
}
