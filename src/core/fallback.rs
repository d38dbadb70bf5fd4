//! Client-side fallback engine
//!
//! Re-applies filter, sort and paging over a full snapshot when the server
//! cannot be trusted to have done so. The steps are the in-memory
//! counterpart of the query string: predicates go through the same
//! normalization as [`filter::build`](crate::core::filter::build), so an
//! endpoint that honors the protocol and this engine agree on every page.
//!
//! ```text
//! snapshot ──filter (AND)──▶ matching ──stable sort──▶ ordered ──slice──▶ ListResult
//!                               │
//!                               └── total_count = matching.len()
//! ```

use crate::core::field::{FieldValue, Record};
use crate::core::predicate::{FilterPredicate, matches_all, normalize_all};
use crate::core::query::{ListQuery, ListResult, SortDirection, SortSpec};
use crate::core::response::{Normalized, ResponseShape};
use std::cmp::Ordering;

/// Decide whether a normalized server response needs client-side reconciliation
///
/// - endpoints known not to honor the protocol always do
/// - a bare array gives no total, so any active filter, sort, page or count
///   request makes it untrustworthy
/// - an envelope without a count cannot answer paged or counted requests
/// - a reported count is only trusted when the items fit the requested
///   window: more items than the page size, or than the count itself, means
///   the server ignored `$top`/`$skip` or returned a partial envelope
pub fn needs_fallback<T>(normalized: &Normalized<T>, honors_query: bool, query: &ListQuery) -> bool {
    if !honors_query {
        return true;
    }
    let returned = normalized.result.items.len();
    match normalized.shape {
        ResponseShape::CountOnly => false,
        ResponseShape::Envelope {
            count_reported: true,
        } => {
            let overflows_page = query
                .page
                .as_ref()
                .is_some_and(|page| returned > page.page_size());
            overflows_page || returned > normalized.result.total_count
        }
        ResponseShape::Envelope {
            count_reported: false,
        } => query.page.is_some() || query.count,
        ResponseShape::BareArray => {
            query.has_active_filter() || query.sort.is_some() || query.page.is_some() || query.count
        }
    }
}

/// Keep the records matching every predicate, in their original order
pub fn apply_filters<T: Record + Clone>(records: &[T], predicates: &[FilterPredicate]) -> Vec<T> {
    let active = normalize_all(predicates);
    records
        .iter()
        .filter(|record| matches_all(&active, *record))
        .cloned()
        .collect()
}

/// How a column is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKind {
    /// Integers, floats, or booleans (false < true)
    Numeric,
    /// Datetimes and date-like strings; unparseable values count as missing
    Temporal,
    /// Case-folded text with the raw text as tiebreak
    Text,
}

impl SortKind {
    /// Infer the comparison from the non-null values of a column
    pub fn infer<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a FieldValue>,
    {
        let mut numeric = true;
        let mut boolean = true;
        let mut temporal_candidate = true;
        let mut any_timestamp = false;
        let mut seen = false;

        for value in values {
            if value.is_null() {
                continue;
            }
            seen = true;
            numeric &= matches!(value, FieldValue::Integer(_) | FieldValue::Float(_));
            boolean &= matches!(value, FieldValue::Boolean(_));
            match value {
                FieldValue::DateTime(_) => any_timestamp = true,
                FieldValue::String(_) => any_timestamp |= value.as_timestamp().is_some(),
                _ => temporal_candidate = false,
            }
        }

        if !seen {
            SortKind::Text
        } else if numeric || boolean {
            SortKind::Numeric
        } else if temporal_candidate && any_timestamp {
            SortKind::Temporal
        } else {
            SortKind::Text
        }
    }
}

#[derive(Debug, Clone)]
enum SortKey {
    Number(f64),
    Time(i64),
    Text { folded: String, raw: String },
    Missing,
}

impl SortKey {
    fn extract(kind: SortKind, value: Option<&FieldValue>) -> Self {
        let Some(value) = value else {
            return SortKey::Missing;
        };
        match (kind, value) {
            (_, FieldValue::Null) => SortKey::Missing,
            (SortKind::Numeric, FieldValue::Boolean(b)) => SortKey::Number(f64::from(u8::from(*b))),
            (SortKind::Numeric, other) => match other.as_f64() {
                Some(n) if !n.is_nan() => SortKey::Number(n),
                _ => SortKey::Missing,
            },
            (SortKind::Temporal, other) => other
                .as_timestamp()
                .map(|dt| SortKey::Time(dt.timestamp_micros()))
                .unwrap_or(SortKey::Missing),
            (SortKind::Text, other) => {
                let raw = other.group_key();
                SortKey::Text {
                    folded: raw.to_lowercase(),
                    raw,
                }
            }
        }
    }

    fn is_missing(&self) -> bool {
        matches!(self, SortKey::Missing)
    }

    /// Ascending comparison of two present keys
    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Time(a), SortKey::Time(b)) => a.cmp(b),
            (
                SortKey::Text { folded: a, raw: ra },
                SortKey::Text { folded: b, raw: rb },
            ) => a.cmp(b).then_with(|| ra.cmp(rb)),
            _ => Ordering::Equal,
        }
    }
}

/// Stable sort by one field
///
/// Missing, null and (for date columns) unparseable values go last in both
/// directions; ties keep their original relative order.
pub fn apply_sort<T: Record>(records: Vec<T>, sort: &SortSpec) -> Vec<T> {
    let values: Vec<Option<FieldValue>> =
        records.iter().map(|r| r.field_value(&sort.field)).collect();
    let kind = SortKind::infer(values.iter().flatten());

    let mut keyed: Vec<(SortKey, T)> = values
        .iter()
        .map(|v| SortKey::extract(kind, v.as_ref()))
        .zip(records)
        .collect();

    keyed.sort_by(|(a, _), (b, _)| match (a.is_missing(), b.is_missing()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match sort.direction {
            SortDirection::Ascending => a.compare(b),
            SortDirection::Descending => b.compare(a),
        },
    });

    keyed.into_iter().map(|(_, record)| record).collect()
}

/// The `[offset, offset + limit)` window of `records`
pub fn slice<T>(records: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    let window = records.into_iter().skip(offset);
    match limit {
        Some(limit) => window.take(limit).collect(),
        None => window.collect(),
    }
}

/// Filter, sort and slice `records` for an explicit offset/limit window
pub fn evaluate_window<T: Record + Clone>(
    records: &[T],
    predicates: &[FilterPredicate],
    sort: Option<&SortSpec>,
    offset: usize,
    limit: Option<usize>,
) -> ListResult<T> {
    let matching = apply_filters(records, predicates);
    let total_count = matching.len();
    let ordered = match sort {
        Some(sort) => apply_sort(matching, sort),
        None => matching,
    };
    ListResult::new(slice(ordered, offset, limit), total_count)
}

/// Run a whole [`ListQuery`] over an in-memory collection
pub fn evaluate<T: Record + Clone>(records: &[T], query: &ListQuery) -> ListResult<T> {
    let (offset, limit) = match &query.page {
        Some(page) => (page.offset(), Some(page.page_size())),
        None => (0, None),
    };
    evaluate_window(records, &query.predicates, query.sort.as_ref(), offset, limit)
}

/// Replace an untrusted server result with the snapshot evaluation
///
/// The server result only feeds diagnostics; the returned page and total
/// always come from `snapshot`.
pub fn reconcile<T: Record + Clone>(
    server: &ListResult<T>,
    snapshot: &[T],
    query: &ListQuery,
) -> ListResult<T> {
    let result = evaluate(snapshot, query);
    if server.total_count != result.total_count || server.items.len() != result.items.len() {
        tracing::debug!(
            server_total = server.total_count,
            server_items = server.items.len(),
            reconciled_total = result.total_count,
            reconciled_items = result.items.len(),
            "Reconciled list result from snapshot"
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::predicate::Literal;
    use serde_json::{Value, json};

    fn names(records: &[Value]) -> Vec<&str> {
        records
            .iter()
            .map(|r| r["name"].as_str().unwrap_or("-"))
            .collect()
    }

    fn response(shape: ResponseShape, returned: usize, total: usize) -> Normalized<Value> {
        let items = (0..returned).map(|i| json!({ "id": i })).collect();
        Normalized {
            result: ListResult::new(items, total),
            shape,
        }
    }

    #[test]
    fn test_needs_fallback_matrix() {
        let plain = ListQuery::new();
        let paged = ListQuery::new().page(1, 10);
        let filtered = ListQuery::new().filter(FilterPredicate::contains("name", "a"));
        let counted = ResponseShape::Envelope {
            count_reported: true,
        };
        let uncounted = ResponseShape::Envelope {
            count_reported: false,
        };

        assert!(needs_fallback(&response(ResponseShape::CountOnly, 0, 3), false, &plain));
        assert!(!needs_fallback(&response(ResponseShape::BareArray, 3, 3), true, &plain));
        assert!(needs_fallback(&response(ResponseShape::BareArray, 3, 3), true, &paged));
        assert!(needs_fallback(&response(ResponseShape::BareArray, 3, 3), true, &filtered));
        assert!(!needs_fallback(&response(counted, 10, 42), true, &paged));
        assert!(needs_fallback(&response(uncounted, 3, 3), true, &paged));
        assert!(!needs_fallback(&response(uncounted, 3, 3), true, &filtered));
    }

    #[test]
    fn test_counted_envelope_larger_than_page_is_untrusted() {
        let second_page = ListQuery::new().page(2, 2).with_count();
        let counted = ResponseShape::Envelope {
            count_reported: true,
        };

        assert!(!needs_fallback(&response(counted, 2, 5), true, &second_page));
        assert!(needs_fallback(&response(counted, 5, 5), true, &second_page));
        // more items than the reported total
        assert!(needs_fallback(&response(counted, 4, 2), true, &ListQuery::new()));
    }

    #[test]
    fn test_numeric_sort_is_numeric() {
        let records = vec![
            json!({ "name": "a", "price": 100 }),
            json!({ "name": "b", "price": 9.5 }),
            json!({ "name": "c", "price": 20 }),
        ];
        let sorted = apply_sort(records, &SortSpec::asc("price"));
        assert_eq!(names(&sorted), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_missing_values_sort_last_in_both_directions() {
        let records = vec![
            json!({ "name": "none" }),
            json!({ "name": "old", "createdAt": "2023-01-05T00:00:00Z" }),
            json!({ "name": "bad", "createdAt": "not a date" }),
            json!({ "name": "new", "createdAt": "2024-02-01" }),
            json!({ "name": "null", "createdAt": null }),
        ];

        let asc = apply_sort(records.clone(), &SortSpec::asc("createdAt"));
        assert_eq!(names(&asc), vec!["old", "new", "none", "bad", "null"]);

        let desc = apply_sort(records, &SortSpec::desc("createdAt"));
        assert_eq!(names(&desc), vec!["new", "old", "none", "bad", "null"]);
    }

    #[test]
    fn test_text_sort_is_case_folded_and_stable() {
        let records = vec![
            json!({ "name": "banana", "id": 1 }),
            json!({ "name": "Apple", "id": 2 }),
            json!({ "name": "apple", "id": 3 }),
            json!({ "name": "Apple", "id": 4 }),
        ];
        let sorted = apply_sort(records, &SortSpec::asc("name"));
        let ids: Vec<i64> = sorted.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        // "Apple" < "apple" on the raw tiebreak; equal keys keep input order
        assert_eq!(ids, vec![2, 4, 3, 1]);
    }

    #[test]
    fn test_boolean_sort() {
        let records = vec![
            json!({ "name": "on", "active": true }),
            json!({ "name": "off", "active": false }),
        ];
        let sorted = apply_sort(records, &SortSpec::asc("active"));
        assert_eq!(names(&sorted), vec!["off", "on"]);
    }

    #[test]
    fn test_sort_kind_inference() {
        let ints = [FieldValue::Integer(1), FieldValue::Float(2.5), FieldValue::Null];
        assert_eq!(SortKind::infer(ints.iter()), SortKind::Numeric);

        let dates = [
            FieldValue::String("2024-01-01".into()),
            FieldValue::String("".into()),
        ];
        assert_eq!(SortKind::infer(dates.iter()), SortKind::Temporal);

        let mixed = [FieldValue::String("abc".into()), FieldValue::Integer(3)];
        assert_eq!(SortKind::infer(mixed.iter()), SortKind::Text);

        assert_eq!(SortKind::infer([].iter()), SortKind::Text);
    }

    #[test]
    fn test_slice_windows() {
        assert_eq!(slice(vec![1, 2, 3, 4, 5], 2, Some(2)), vec![3, 4]);
        assert_eq!(slice(vec![1, 2, 3], 2, Some(5)), vec![3]);
        assert_eq!(slice(vec![1, 2, 3], 5, Some(5)), Vec::<i32>::new());
        assert_eq!(slice(vec![1, 2, 3], 1, None), vec![2, 3]);
    }

    #[test]
    fn test_evaluate_filters_sorts_and_pages() {
        let records = vec![
            json!({ "name": "d", "status": "APPROVED", "rating": 4 }),
            json!({ "name": "a", "status": "PENDING", "rating": 5 }),
            json!({ "name": "c", "status": "APPROVED", "rating": 5 }),
            json!({ "name": "b", "status": "APPROVED", "rating": 3 }),
        ];
        let query = ListQuery::new()
            .filter(FilterPredicate::equals("status", Literal::enumeration("APPROVED")))
            .sort_by(SortSpec::desc("rating"))
            .page(1, 2);

        let result = evaluate(&records, &query);
        assert_eq!(result.total_count, 3);
        assert_eq!(names(&result.items), vec!["c", "d"]);

        let page_two = evaluate(&records, &query.clone().page(2, 2));
        assert_eq!(names(&page_two.items), vec!["b"]);
    }

    #[test]
    fn test_page_past_end_is_empty_not_error() {
        let records = vec![json!({ "name": "only" })];
        let result = evaluate(&records, &ListQuery::new().page(4, 10));
        assert!(result.is_empty());
        assert_eq!(result.total_count, 1);
    }

    #[test]
    fn test_reconcile_replaces_untrusted_result() {
        let snapshot = vec![
            json!({ "name": "x", "status": "BANNED" }),
            json!({ "name": "y", "status": "APPROVED" }),
        ];
        let server = ListResult::new(snapshot.clone(), 2);
        let query = ListQuery::new()
            .filter(FilterPredicate::equals("status", Literal::enumeration("APPROVED")))
            .page(1, 10);
        let result = reconcile(&server, &snapshot, &query);
        assert_eq!(result.total_count, 1);
        assert_eq!(names(&result.items), vec!["y"]);
    }
}
