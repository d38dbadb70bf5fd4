//! # market-query
//!
//! Query and pagination reconciliation for paginated list screens backed by
//! OData-style endpoints.
//!
//! ## Features
//!
//! - **Filter Builder**: Typed predicates serialized to `$filter` (contains, eq, any-lambda, OR groups)
//! - **Query Assembly**: `$filter`, `$orderby`, `$count`, `$top`, `$skip` in a fixed order
//! - **Response Normalization**: Bare arrays, `{value, @odata.count}` envelopes and bare counts
//! - **Client-Side Fallback**: Filter, sort and page a full snapshot when the server cannot be trusted
//! - **Debounced Search**: Coalesce keystrokes into one request after a quiet period
//! - **Stale Result Discarding**: Only the most recently issued request updates the screen
//! - **Reference Server**: axum endpoints that honor or ignore the protocol, for testing clients
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use market_query::prelude::*;
//!
//! let transport = HttpTransport::from_config(&config)?;
//! let client = Arc::new(ListClient::new(Arc::new(transport), config));
//!
//! let query = ListQuery::new()
//!     .filter(FilterPredicate::equals("status", Literal::enumeration("APPROVED")))
//!     .sort_by(SortSpec::asc("name"))
//!     .page(1, 10)
//!     .with_count();
//!
//! let page = client.fetch("shops", &query).await?;
//! println!("{} of {}", page.items.len(), page.total_count);
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Query model ===
    pub use crate::core::{
        field::{FieldValue, Record},
        filter::FilterExpressionBuilder,
        predicate::{FilterPredicate, Literal},
        query::{
            ListQuery, ListResult, PageRequest, PaginationMeta, QueryString, SortDirection,
            SortSpec, assemble,
        },
        wire::QueryClauses,
    };

    // === Reconciliation ===
    pub use crate::core::{
        debounce::{DebounceState, Debouncer},
        fallback::{needs_fallback, reconcile},
        response::{ResponseNormalizer, ResponseShape},
        snapshot::Snapshot,
        store::QueryableStore,
        tracker::{RequestTracker, Ticket},
    };

    // === Errors ===
    pub use crate::core::error::{
        ConfigError, QueryError, QueryResult, ResponseError, TransportError,
    };

    // === Events ===
    pub use crate::core::events::{EventBus, MutationEvent};

    // === Client ===
    #[cfg(feature = "http")]
    pub use crate::client::HttpTransport;
    pub use crate::client::{ListClient, ListController, ListState, SearchInput};
    pub use crate::core::service::Transport;

    // === Storage ===
    pub use crate::storage::{InMemoryBackend, InMemoryCollection, QuerySupport};

    // === Config ===
    pub use crate::config::{EndpointConfig, QueryConfig};

    // === Server ===
    pub use crate::server::ServerBuilder;

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;
}
