//! List screen controller
//!
//! Owns the current search term, filters, sort and page of one list screen
//! and publishes a [`ListState`] the view renders from. Every load is issued
//! a ticket; a response whose ticket has been superseded is dropped without
//! touching the state, so the screen always shows the latest request.

use crate::client::list::ListClient;
use crate::core::debounce::{DebounceState, Debouncer};
use crate::core::error::QueryResult;
use crate::core::predicate::FilterPredicate;
use crate::core::query::{ListQuery, ListResult, PaginationMeta, SortSpec};
use crate::core::tracker::{RequestTracker, Ticket};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What the list screen currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum ListState {
    /// Nothing requested yet
    Idle,
    /// A request for `query` is in flight
    Loading { query: ListQuery },
    /// The latest request succeeded (possibly with zero items)
    Loaded {
        query: ListQuery,
        result: ListResult<Value>,
    },
    /// The latest request failed; the caller decides whether to retry
    Failed {
        query: ListQuery,
        code: String,
        message: String,
    },
}

impl ListState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ListState::Loading { .. })
    }

    pub fn result(&self) -> Option<&ListResult<Value>> {
        match self {
            ListState::Loaded { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Pagination of the loaded page, if the query was paged
    pub fn pagination(&self) -> Option<PaginationMeta> {
        match self {
            ListState::Loaded { query, result } => query.page.as_ref().map(|p| result.pagination(p)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ListParams {
    search: String,
    filters: Vec<FilterPredicate>,
    sort: Option<SortSpec>,
    page: usize,
}

/// Drives one list endpoint on behalf of a screen
pub struct ListController {
    client: Arc<ListClient>,
    endpoint: String,
    search_fields: Vec<String>,
    page_size: usize,
    tracker: RequestTracker,
    params: Mutex<ListParams>,
    state: watch::Sender<ListState>,
}

impl ListController {
    /// Create a controller for a configured endpoint
    pub fn new(client: Arc<ListClient>, endpoint: &str) -> QueryResult<Arc<Self>> {
        let config = client.endpoint(endpoint)?;
        let search_fields = config.search_fields.clone();
        let page_size = client.config().default_page_size;
        let (state, _) = watch::channel(ListState::Idle);

        Ok(Arc::new(Self {
            client,
            endpoint: endpoint.to_string(),
            search_fields,
            page_size,
            tracker: RequestTracker::new(),
            params: Mutex::new(ListParams {
                page: 1,
                ..Default::default()
            }),
            state,
        }))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<ListState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ListState {
        self.state.borrow().clone()
    }

    /// Query built from the current parameters
    pub fn current_query(&self) -> ListQuery {
        let params = self.params();
        let mut query = ListQuery::new();
        if !self.search_fields.is_empty() {
            query = query.search(&params.search, self.search_fields.iter().cloned());
        }
        query.predicates.extend(params.filters.iter().cloned());
        query.sort = params.sort.clone();
        query.page(params.page, self.page_size).with_count()
    }

    /// Change the search term; returns to the first page
    pub fn set_search(&self, term: impl Into<String>) {
        let term = term.into();
        self.update(|params| {
            params.search = term;
            params.page = 1;
        });
    }

    /// Replace the structured filters; returns to the first page
    pub fn set_filters(&self, filters: Vec<FilterPredicate>) {
        self.update(|params| {
            params.filters = filters;
            params.page = 1;
        });
    }

    pub fn set_sort(&self, sort: Option<SortSpec>) {
        self.update(|params| params.sort = sort);
    }

    pub fn set_page(&self, page: usize) {
        self.update(|params| params.page = page.max(1));
    }

    /// Issue a ticket for the current query and mark the state as loading
    ///
    /// Issuing supersedes every earlier ticket, so call this synchronously at
    /// the moment the request is decided on.
    pub fn issue(&self) -> Ticket<ListQuery> {
        let ticket = self.tracker.issue(self.current_query());
        tracing::debug!(endpoint = %self.endpoint, seq = ticket.seq(), "Issued list request");
        self.state.send_replace(ListState::Loading {
            query: ticket.params().clone(),
        });
        ticket
    }

    /// Run an issued request and apply its outcome if still current
    ///
    /// Returns `None` when the ticket was superseded while in flight.
    pub async fn run(&self, ticket: Ticket<ListQuery>) -> Option<QueryResult<ListResult<Value>>> {
        let outcome = self.client.fetch(&self.endpoint, ticket.params()).await;
        self.apply(ticket, outcome)
    }

    /// Issue and run a request for the current parameters
    pub async fn load(&self) -> Option<QueryResult<ListResult<Value>>> {
        let ticket = self.issue();
        self.run(ticket).await
    }

    /// Issue a request now and run it in the background
    pub fn spawn_load(self: &Arc<Self>) -> JoinHandle<()> {
        let ticket = self.issue();
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.run(ticket).await;
        })
    }

    /// Wire a debounced search box using the configured debounce interval
    pub fn attach_search(self: &Arc<Self>) -> SearchInput {
        let delay = self.client.config().debounce();
        self.attach_search_with_delay(delay)
    }

    /// Wire a debounced search box to this controller
    ///
    /// Each fired term resets to the first page and loads it.
    pub fn attach_search_with_delay(self: &Arc<Self>, delay: Duration) -> SearchInput {
        let (debouncer, mut fired) = Debouncer::new(delay);
        let controller = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(term) = fired.recv().await {
                controller.set_search(term);
                controller.spawn_load();
            }
        });
        SearchInput { debouncer, task }
    }

    fn apply(
        &self,
        ticket: Ticket<ListQuery>,
        outcome: QueryResult<ListResult<Value>>,
    ) -> Option<QueryResult<ListResult<Value>>> {
        if !self.tracker.is_current(&ticket) {
            tracing::debug!(
                endpoint = %self.endpoint,
                seq = ticket.seq(),
                latest = self.tracker.latest_seq(),
                "Discarding stale list response"
            );
            return None;
        }

        let query = ticket.into_params();
        let state = match &outcome {
            Ok(result) => ListState::Loaded {
                query,
                result: result.clone(),
            },
            Err(e) => {
                tracing::warn!(endpoint = %self.endpoint, error = %e, "List request failed");
                ListState::Failed {
                    query,
                    code: e.error_code().to_string(),
                    message: e.display_message(),
                }
            }
        };
        self.state.send_replace(state);
        Some(outcome)
    }

    /// Change the parameters and supersede any request issued for the old ones
    fn update(&self, change: impl FnOnce(&mut ListParams)) {
        {
            let mut params = self.params();
            change(&mut *params);
        }
        self.tracker.invalidate();
    }

    fn params(&self) -> std::sync::MutexGuard<'_, ListParams> {
        self.params.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Search box input feeding a [`ListController`] through a debouncer
pub struct SearchInput {
    debouncer: Debouncer<String>,
    task: JoinHandle<()>,
}

impl SearchInput {
    pub fn on_input(&self, value: impl Into<String>) {
        self.debouncer.on_input(value.into());
    }

    pub fn cancel(&self) {
        self.debouncer.cancel();
    }

    pub fn state(&self) -> DebounceState {
        self.debouncer.state()
    }

    pub fn fired_count(&self) -> u64 {
        self.debouncer.fired_count()
    }
}

impl Drop for SearchInput {
    fn drop(&mut self) {
        self.task.abort();
    }
}
