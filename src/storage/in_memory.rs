//! In-memory list backend for testing and development
//!
//! Each [`InMemoryCollection`] answers list requests the way a real endpoint
//! would, including the ways real endpoints fall short: a collection can
//! ignore the query entirely (bare array of everything) or honor it without
//! ever reporting a total.

use crate::core::error::{QueryError, QueryResult, TransportError};
use crate::core::events::{EventBus, MutationEvent};
use crate::core::fallback;
use crate::core::query::QueryString;
use crate::core::service::Transport;
use crate::core::store::QueryableStore;
use crate::core::wire::{QueryClauses, WireError};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Value, json};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// How much of the query protocol a collection honors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuerySupport {
    /// Filter, sort, page and `$count`
    #[default]
    Full,
    /// Filter, sort and page, but the envelope never carries a count
    NoCount,
    /// Query options are ignored; every record comes back as a bare array
    Ignored,
}

/// An ordered in-memory collection of JSON records
///
/// Records are kept in insertion order and keyed by their `id` field.
/// Cheap to clone; all clones share the same records.
#[derive(Clone)]
pub struct InMemoryCollection {
    name: String,
    support: QuerySupport,
    records: Arc<RwLock<IndexMap<String, Value>>>,
    events: Option<EventBus>,
}

impl InMemoryCollection {
    /// Create an empty collection honoring the full protocol
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            support: QuerySupport::Full,
            records: Arc::new(RwLock::new(IndexMap::new())),
            events: None,
        }
    }

    /// Create an empty collection that ignores query options
    pub fn legacy(name: impl Into<String>) -> Self {
        Self::new(name).with_support(QuerySupport::Ignored)
    }

    pub fn with_support(mut self, support: QuerySupport) -> Self {
        self.support = support;
        self
    }

    /// Publish a [`MutationEvent`] for every write
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Insert records without publishing events
    pub fn seed<I>(self, records: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        {
            let mut map = self.write()?;
            for record in records {
                let (id, record) = with_id(record)?;
                map.insert(id, record);
            }
        }
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn support(&self) -> QuerySupport {
        self.support
    }

    pub fn len(&self) -> usize {
        self.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> QueryResult<Option<Value>> {
        Ok(self.read()?.get(id).cloned())
    }

    /// Insert a record, assigning an `id` when it has none
    pub fn insert(&self, record: Value) -> QueryResult<Value> {
        let (id, record) = with_id(record)?;
        {
            let mut map = self.write()?;
            if map.contains_key(&id) {
                return Err(status(409, format!("Record '{}' already exists", id)));
            }
            map.insert(id.clone(), record.clone());
        }
        self.publish(MutationEvent::Created {
            collection: self.name.clone(),
            id,
        });
        Ok(record)
    }

    /// Replace a record, keeping its position and id
    pub fn update(&self, id: &str, record: Value) -> QueryResult<Value> {
        let mut record = record;
        let Some(fields) = record.as_object_mut() else {
            return Err(status(400, "Record must be a JSON object"));
        };
        fields.insert("id".to_string(), Value::String(id.to_string()));
        {
            let mut map = self.write()?;
            let Some(slot) = map.get_mut(id) else {
                return Err(not_found(&self.name, id));
            };
            *slot = record.clone();
        }
        self.publish(MutationEvent::Updated {
            collection: self.name.clone(),
            id: id.to_string(),
        });
        Ok(record)
    }

    pub fn delete(&self, id: &str) -> QueryResult<()> {
        let removed = self.write()?.shift_remove(id);
        if removed.is_none() {
            return Err(not_found(&self.name, id));
        }
        self.publish(MutationEvent::Deleted {
            collection: self.name.clone(),
            id: id.to_string(),
        });
        Ok(())
    }

    /// Answer a list request the way this collection's endpoint would
    pub fn respond(&self, query: &QueryString) -> QueryResult<Value> {
        let records = self.list_all();
        if self.support == QuerySupport::Ignored {
            return Ok(Value::Array(records));
        }

        let clauses = QueryClauses::from_query(query).map_err(rejected)?;
        let (offset, limit) = clauses.window();
        let result = fallback::evaluate_window(
            &records,
            &clauses.predicates,
            clauses.sort.as_ref(),
            offset,
            limit,
        );

        if clauses.count && self.support == QuerySupport::Full {
            Ok(json!({ "value": result.items, "@odata.count": result.total_count }))
        } else {
            Ok(json!({ "value": result.items }))
        }
    }

    /// Answer a count-only request
    ///
    /// Legacy collections count everything regardless of `$filter`.
    pub fn respond_count(&self, query: &QueryString) -> QueryResult<Value> {
        let records = self.list_all();
        if self.support == QuerySupport::Ignored {
            return Ok(Value::from(records.len()));
        }
        let clauses = QueryClauses::from_query(query).map_err(rejected)?;
        let matching = self.apply_filters(records, &clauses.predicates);
        Ok(Value::from(matching.len()))
    }

    fn publish(&self, event: MutationEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    fn read(&self) -> QueryResult<std::sync::RwLockReadGuard<'_, IndexMap<String, Value>>> {
        self.records
            .read()
            .map_err(|e| QueryError::Internal(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> QueryResult<std::sync::RwLockWriteGuard<'_, IndexMap<String, Value>>> {
        self.records
            .write()
            .map_err(|e| QueryError::Internal(format!("Failed to acquire write lock: {}", e)))
    }
}

impl QueryableStore<Value> for InMemoryCollection {
    fn list_all(&self) -> Vec<Value> {
        self.read()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// A set of in-memory collections addressed by path
///
/// Routes `name`, `name/$count` and `name/{id}` the way a list backend does.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    collections: IndexMap<String, InMemoryCollection>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection under its name
    pub fn with_collection(mut self, collection: InMemoryCollection) -> Self {
        self.collections
            .insert(collection.name().to_string(), collection);
        self
    }

    pub fn collection(&self, name: &str) -> QueryResult<&InMemoryCollection> {
        self.collections
            .get(name)
            .ok_or_else(|| status(404, format!("Unknown collection '{}'", name)))
    }

    pub fn collection_names(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }
}

/// Split `shops/42` into `("shops", Some("42"))`
fn route(path: &str) -> QueryResult<(&str, Option<&str>)> {
    let mut segments = path.trim_matches('/').split('/');
    let name = segments.next().filter(|s| !s.is_empty());
    let id = segments.next().filter(|s| !s.is_empty());
    match (name, segments.next()) {
        (Some(name), None) => Ok((name, id)),
        _ => Err(status(404, format!("No route for '{}'", path))),
    }
}

#[async_trait]
impl Transport for InMemoryBackend {
    async fn get(&self, path: &str, query: &QueryString) -> QueryResult<Value> {
        let (name, id) = route(path)?;
        let collection = self.collection(name)?;
        match id {
            None => collection.respond(query),
            Some("$count") => collection.respond_count(query),
            Some(id) => collection
                .get(id)?
                .ok_or_else(|| not_found(collection.name(), id)),
        }
    }

    async fn post(&self, path: &str, body: Value) -> QueryResult<Value> {
        match route(path)? {
            (name, None) => self.collection(name)?.insert(body),
            _ => Err(status(405, "POST is only allowed on collections")),
        }
    }

    async fn put(&self, path: &str, body: Value) -> QueryResult<Value> {
        match route(path)? {
            (name, Some(id)) => self.collection(name)?.update(id, body),
            _ => Err(status(405, "PUT requires a record id")),
        }
    }

    async fn delete(&self, path: &str) -> QueryResult<()> {
        match route(path)? {
            (name, Some(id)) => self.collection(name)?.delete(id),
            _ => Err(status(405, "DELETE requires a record id")),
        }
    }
}

fn with_id(mut record: Value) -> QueryResult<(String, Value)> {
    let Some(fields) = record.as_object_mut() else {
        return Err(status(400, "Record must be a JSON object"));
    };
    let existing = match fields.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let id = match existing {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4().to_string();
            fields.insert("id".to_string(), Value::String(id.clone()));
            id
        }
    };
    Ok((id, record))
}

fn status(code: u16, message: impl Into<String>) -> QueryError {
    QueryError::Transport(TransportError::Status {
        status: code,
        message: Some(message.into()),
    })
}

fn not_found(collection: &str, id: &str) -> QueryError {
    status(404, format!("Record '{}' not found in '{}'", id, collection))
}

fn rejected(err: WireError) -> QueryError {
    status(400, err.to_string())
}
