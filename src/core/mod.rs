//! Core module containing the query model and the reconciliation engine

pub mod debounce;
pub mod error;
pub mod events;
pub mod fallback;
pub mod field;
pub mod filter;
pub mod predicate;
pub mod query;
pub mod response;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod tracker;
pub mod wire;

pub use debounce::{DEFAULT_DEBOUNCE, DebounceState, Debouncer};
pub use error::{ConfigError, ErrorResponse, QueryError, QueryResult, ResponseError, TransportError};
pub use events::{EventBus, EventEnvelope, MutationEvent};
pub use fallback::{SortKind, needs_fallback, reconcile};
pub use field::{FieldValue, Record};
pub use filter::FilterExpressionBuilder;
pub use predicate::{FilterPredicate, Literal};
pub use query::{
    ListQuery, ListResult, PageRequest, PaginationMeta, QueryString, SortDirection, SortSpec,
    assemble,
};
pub use response::{Normalized, ResponseNormalizer, ResponseShape};
pub use service::Transport;
pub use snapshot::Snapshot;
pub use store::QueryableStore;
pub use tracker::{RequestTracker, Ticket};
pub use wire::{QueryClauses, WireError};
