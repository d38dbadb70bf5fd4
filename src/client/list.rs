//! List client: fetch, normalize and reconcile against snapshots
//!
//! ```text
//! ListQuery ──▶ assemble ──▶ Transport::get ──▶ normalize ──┬─▶ trusted ──────────────▶ ListResult
//!                                                          └─▶ needs_fallback ──▶ reconcile(snapshot)
//! ```
//!
//! Endpoints configured with `honors_query: false` never see the query; their
//! pages come straight from the snapshot.

use crate::config::{EndpointConfig, QueryConfig};
use crate::core::error::{QueryResult, ResponseError};
use crate::core::events::EventBus;
use crate::core::fallback::{self, needs_fallback};
use crate::core::predicate::FilterPredicate;
use crate::core::query::{ListQuery, ListResult, PageRequest, QueryString, assemble};
use crate::core::response::{ResponseNormalizer, ResponseShape};
use crate::core::service::{Transport, count_path, record_path};
use crate::core::snapshot::Snapshot;
use crate::core::store::QueryableStore;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Cached snapshots plus an invalidation generation per endpoint
///
/// A refresh only stores its snapshot if no invalidation happened while it
/// was fetching, so a write racing a fetch never leaves old data cached.
#[derive(Default)]
struct SnapshotCache {
    entries: HashMap<String, Snapshot>,
    generations: HashMap<String, u64>,
    epoch: u64,
}

impl SnapshotCache {
    fn generation(&self, name: &str) -> (u64, u64) {
        (self.epoch, self.generations.get(name).copied().unwrap_or(0))
    }

    fn invalidate(&mut self, name: &str) -> bool {
        *self.generations.entry(name.to_string()).or_insert(0) += 1;
        self.entries.remove(name).is_some()
    }

    fn invalidate_all(&mut self) {
        self.epoch += 1;
        self.entries.clear();
    }
}

/// Client for the configured list endpoints
///
/// Keeps one [`Snapshot`] per endpoint, fetched on first use and dropped
/// whenever a write goes through this client or a
/// [`MutationEvent`](crate::core::events::MutationEvent) arrives for it.
pub struct ListClient {
    transport: Arc<dyn Transport>,
    config: QueryConfig,
    normalizer: ResponseNormalizer,
    snapshots: RwLock<SnapshotCache>,
}

impl ListClient {
    pub fn new(transport: Arc<dyn Transport>, config: QueryConfig) -> Self {
        let normalizer = ResponseNormalizer::new().with_count_fields(config.count_field_names.clone());
        Self {
            transport,
            config,
            normalizer,
            snapshots: RwLock::new(SnapshotCache::default()),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn endpoint(&self, name: &str) -> QueryResult<&EndpointConfig> {
        Ok(self.config.endpoint(name)?)
    }

    /// Query searching `term` over the endpoint's search fields
    pub fn search_query(&self, name: &str, term: &str) -> QueryResult<ListQuery> {
        let endpoint = self.endpoint(name)?;
        Ok(ListQuery::new().search(term, endpoint.search_fields.iter().cloned()))
    }

    /// Fetch one page of an endpoint
    ///
    /// Transport and shape errors are returned as-is; the fallback only
    /// replaces results the endpoint did produce.
    pub async fn fetch(&self, name: &str, query: &ListQuery) -> QueryResult<ListResult<Value>> {
        let endpoint = self.endpoint(name)?;
        let query = self.clamped(query);

        if !endpoint.honors_query {
            tracing::debug!(endpoint = %name, "Endpoint ignores query options, evaluating snapshot");
            let snapshot = self.snapshot(name).await?;
            return Ok(snapshot.query(&query));
        }

        let raw = self
            .transport
            .get(&endpoint.path, &query.to_query_string())
            .await?;
        let normalized = self.normalizer.normalize(raw)?;

        if !needs_fallback(&normalized, endpoint.honors_query, &query) {
            return Ok(normalized.result);
        }

        tracing::debug!(
            endpoint = %name,
            shape = ?normalized.shape,
            "Server result cannot be trusted for this query, reconciling"
        );
        let snapshot = self.snapshot(name).await?;
        Ok(fallback::reconcile(&normalized.result, snapshot.records(), &query))
    }

    /// [`fetch`](Self::fetch) and deserialize the items
    pub async fn fetch_as<T: DeserializeOwned>(
        &self,
        name: &str,
        query: &ListQuery,
    ) -> QueryResult<ListResult<T>> {
        let result = self.fetch(name, query).await?;
        Ok(result.try_map(serde_json::from_value)?)
    }

    /// Number of records matching `predicates`
    ///
    /// Uses the `$count` sub-path when the endpoint honors queries and the
    /// snapshot otherwise.
    pub async fn count(&self, name: &str, predicates: &[FilterPredicate]) -> QueryResult<usize> {
        let endpoint = self.endpoint(name)?;
        if endpoint.honors_query {
            let filter = crate::core::filter::build(predicates);
            let query = assemble(&filter, None, None, false);
            let raw = self
                .transport
                .get(&count_path(&endpoint.path), &query)
                .await?;
            let normalized = self.normalizer.normalize(raw)?;
            if matches!(normalized.shape, ResponseShape::CountOnly) {
                return Ok(normalized.result.total_count);
            }
            tracing::debug!(endpoint = %name, "Count endpoint returned a list, counting snapshot");
        }

        let snapshot = self.snapshot(name).await?;
        Ok(snapshot.apply_filters(snapshot.list_all(), predicates).len())
    }

    /// Cached snapshot of an endpoint, fetched on first use
    pub async fn snapshot(&self, name: &str) -> QueryResult<Snapshot> {
        if let Some(snapshot) = self.snapshots.read().await.entries.get(name) {
            return Ok(snapshot.clone());
        }
        self.refresh(name).await
    }

    /// Fetch the whole collection and replace the cached snapshot
    ///
    /// When the endpoint is invalidated while the fetch is in flight, the
    /// fetched snapshot is returned to this caller but not cached.
    pub async fn refresh(&self, name: &str) -> QueryResult<Snapshot> {
        let endpoint = self.endpoint(name)?;
        let generation = self.snapshots.read().await.generation(name);
        let raw = self
            .transport
            .get(&endpoint.path, &QueryString::new())
            .await?;
        let normalized = self.normalizer.normalize(raw)?;
        if matches!(normalized.shape, ResponseShape::CountOnly) {
            return Err(ResponseError::Malformed {
                reason: format!("endpoint '{}' returned a count instead of records", name),
            }
            .into());
        }

        let snapshot = Snapshot::new(name, normalized.result.items);
        let mut cache = self.snapshots.write().await;
        if cache.generation(name) != generation {
            tracing::debug!(endpoint = %name, "Snapshot invalidated during fetch, not caching");
            return Ok(snapshot);
        }
        tracing::debug!(endpoint = %name, records = snapshot.len(), "Refreshed snapshot");
        cache.entries.insert(name.to_string(), snapshot.clone());
        Ok(snapshot)
    }

    /// Refresh every configured endpoint, stopping at the first failure
    pub async fn refresh_all(&self) -> QueryResult<()> {
        for endpoint in &self.config.endpoints {
            self.refresh(&endpoint.name).await?;
        }
        Ok(())
    }

    /// Drop the cached snapshot so the next use fetches a fresh one
    pub async fn invalidate(&self, name: &str) {
        if self.snapshots.write().await.invalidate(name) {
            tracing::debug!(endpoint = %name, "Invalidated snapshot");
        }
    }

    pub async fn invalidate_all(&self) {
        self.snapshots.write().await.invalidate_all();
    }

    /// Whether a snapshot of the endpoint is currently cached
    pub async fn has_snapshot(&self, name: &str) -> bool {
        self.snapshots.read().await.entries.contains_key(name)
    }

    /// Records per distinct value of `field`, computed from the snapshot
    pub async fn statistics(&self, name: &str, field: &str) -> QueryResult<IndexMap<String, usize>> {
        Ok(self.snapshot(name).await?.count_by(field))
    }

    pub async fn create(&self, name: &str, record: Value) -> QueryResult<Value> {
        let endpoint = self.endpoint(name)?;
        let created = self.transport.post(&endpoint.path, record).await?;
        self.invalidate(name).await;
        Ok(created)
    }

    pub async fn update(&self, name: &str, id: &str, record: Value) -> QueryResult<Value> {
        let endpoint = self.endpoint(name)?;
        let updated = self
            .transport
            .put(&record_path(&endpoint.path, id), record)
            .await?;
        self.invalidate(name).await;
        Ok(updated)
    }

    pub async fn delete(&self, name: &str, id: &str) -> QueryResult<()> {
        let endpoint = self.endpoint(name)?;
        self.transport
            .delete(&record_path(&endpoint.path, id))
            .await?;
        self.invalidate(name).await;
        Ok(())
    }

    /// Invalidate snapshots as mutation events arrive on `bus`
    ///
    /// Events name a collection; every endpoint whose name or path matches it
    /// is invalidated. A lagging receiver invalidates everything.
    pub fn watch_mutations(self: &Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let client = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        let collection = envelope.event.collection();
                        let affected: Vec<String> = client
                            .config
                            .endpoints
                            .iter()
                            .filter(|e| e.name == collection || e.path == collection)
                            .map(|e| e.name.clone())
                            .collect();
                        for name in affected {
                            client.invalidate(&name).await;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Mutation events lagged, invalidating all snapshots");
                        client.invalidate_all().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn clamped(&self, query: &ListQuery) -> ListQuery {
        let mut query = query.clone();
        if let Some(page) = &query.page {
            let size = self.config.clamp_page_size(page.page_size());
            query.page = Some(PageRequest::new(page.page_number(), size));
        }
        query
    }
}
