//! Transport trait for the list layer's network collaborator

use crate::core::error::QueryResult;
use crate::core::query::QueryString;
use async_trait::async_trait;
use serde_json::Value;

/// Issues requests against list endpoints and returns raw JSON
///
/// Implementations fail with [`TransportError`](crate::core::error::TransportError)
/// on non-2xx answers (status plus optional message body) and on
/// connectivity problems. They never retry.
///
/// Paths are relative to the backend root: `shops`, `shops/$count`,
/// `shops/{id}`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a path with query-string pairs
    async fn get(&self, path: &str, query: &QueryString) -> QueryResult<Value>;

    /// POST a JSON body
    async fn post(&self, path: &str, body: Value) -> QueryResult<Value>;

    /// PUT a JSON body
    async fn put(&self, path: &str, body: Value) -> QueryResult<Value>;

    /// DELETE a resource
    async fn delete(&self, path: &str) -> QueryResult<()>;
}

/// Path of the count-only variant of a collection endpoint
pub fn count_path(collection_path: &str) -> String {
    format!("{}/$count", collection_path.trim_end_matches('/'))
}

/// Path of a single record
pub fn record_path(collection_path: &str, id: &str) -> String {
    format!("{}/{}", collection_path.trim_end_matches('/'), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(count_path("shops"), "shops/$count");
        assert_eq!(count_path("shops/"), "shops/$count");
        assert_eq!(record_path("admin/tickets", "7"), "admin/tickets/7");
    }
}
