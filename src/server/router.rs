//! Router builder utilities for list routes

use super::handlers::{
    AppState, create_record, delete_record, get_record, list_records, update_record,
};
use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Build list routes
///
/// These routes are generic and work for all collections:
/// - GET /{collection} - List records (`$filter`, `$orderby`, `$count`, `$top`, `$skip`)
/// - GET /{collection}/$count - Count matching records
/// - GET /{collection}/{id} - Get a record
/// - POST /{collection} - Create a record
/// - PUT /{collection}/{id} - Replace a record
/// - DELETE /{collection}/{id} - Delete a record
pub fn build_list_routes(state: AppState) -> Router {
    Router::new()
        .route("/{collection}", get(list_records).post(create_record))
        .route(
            "/{collection}/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
