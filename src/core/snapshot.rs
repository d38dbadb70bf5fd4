//! Read-only full-collection snapshots used by the fallback engine

use crate::core::store::QueryableStore;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// The full contents of one collection at one point in time
///
/// Shared read-only between reconciliation passes; a mutation replaces the
/// snapshot rather than editing it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    collection: String,
    records: Arc<Vec<Value>>,
    fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(collection: impl Into<String>, records: Vec<Value>) -> Self {
        Self {
            collection: collection.into(),
            records: Arc::new(records),
            fetched_at: Utc::now(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

impl QueryableStore<Value> for Snapshot {
    fn list_all(&self) -> Vec<Value> {
        self.records.as_ref().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::predicate::FilterPredicate;
    use crate::core::query::{ListQuery, SortSpec};
    use serde_json::json;

    fn shops() -> Snapshot {
        Snapshot::new(
            "shops",
            vec![
                json!({ "name": "Linh", "status": "PENDING" }),
                json!({ "name": "An", "status": "APPROVED" }),
                json!({ "name": "Binh", "status": "APPROVED" }),
                json!({ "name": "Chi" }),
            ],
        )
    }

    #[test]
    fn test_count_by_groups_in_first_seen_order() {
        let counts = shops().count_by("status");
        let pairs: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(
            pairs,
            vec![("PENDING", 1), ("APPROVED", 2), ("null", 1)]
        );
    }

    #[test]
    fn test_snapshot_query() {
        let snapshot = shops();
        let result = snapshot.query(
            &ListQuery::new()
                .filter(FilterPredicate::contains("name", "n"))
                .sort_by(SortSpec::asc("name")),
        );
        let names: Vec<&str> = result
            .items
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["An", "Binh", "Linh"]);
        assert_eq!(result.total_count, 3);
        assert_eq!(snapshot.len(), 4);
    }
}
