//! HTTP handlers for list endpoints
//!
//! Handlers are collection-agnostic: the collection name comes from the path
//! and the query options from the query string.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::sync::Arc;

use crate::core::error::{QueryResult, TransportError};
use crate::core::query::{COUNT_KEY, QueryString};
use crate::storage::InMemoryBackend;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<InMemoryBackend>,
}

/// GET /{collection}
pub async fn list_records(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> QueryResult<Json<Value>> {
    let query = QueryString::from_pairs(params);
    tracing::debug!(%collection, query = %query, "List request");
    let body = state.backend.collection(&collection)?.respond(&query)?;
    Ok(Json(body))
}

/// GET /{collection}/{id}, where an id of `$count` is the count-only variant
pub async fn get_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> QueryResult<Response> {
    let records = state.backend.collection(&collection)?;
    if id == COUNT_KEY {
        let count = records.respond_count(&QueryString::from_pairs(params))?;
        return Ok(Json(count).into_response());
    }
    let record = records.get(&id)?.ok_or_else(|| TransportError::Status {
        status: 404,
        message: Some(format!("Record '{}' not found in '{}'", id, collection)),
    })?;
    Ok(Json(record).into_response())
}

/// POST /{collection}
pub async fn create_record(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(payload): Json<Value>,
) -> QueryResult<Response> {
    let created = state.backend.collection(&collection)?.insert(payload)?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

/// PUT /{collection}/{id}
pub async fn update_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> QueryResult<Json<Value>> {
    let updated = state.backend.collection(&collection)?.update(&id, payload)?;
    Ok(Json(updated))
}

/// DELETE /{collection}/{id}
pub async fn delete_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> QueryResult<StatusCode> {
    state.backend.collection(&collection)?.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
