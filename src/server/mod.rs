//! Reference server exposing in-memory collections as list endpoints
//!
//! Each collection is served under `/{name}` and answers the list protocol
//! according to its [`QuerySupport`](crate::storage::QuerySupport), so the
//! same server can play both a well-behaved endpoint and a legacy one.

pub mod builder;
pub mod handlers;
pub mod router;

pub use builder::ServerBuilder;
pub use handlers::AppState;
pub use router::build_list_routes;
