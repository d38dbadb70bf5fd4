//! Integration tests for the list controller
//!
//! These tests verify that:
//! - Rapid search input is coalesced into a single request for the last value
//! - A late response for superseded parameters never replaces the current result
//! - Failures surface as a failed state without retrying

use async_trait::async_trait;
use market_query::prelude::*;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

// =============================================================================
// Test Transport
// =============================================================================

/// Wraps an in-memory backend, delaying each GET by a scripted amount and
/// recording the query strings it was asked for
struct ScriptedTransport {
    inner: InMemoryBackend,
    delays: Mutex<VecDeque<Duration>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn new(delays: &[u64]) -> Self {
        let shops = InMemoryCollection::new("shops")
            .seed(vec![
                json!({ "id": "1", "name": "a shop" }),
                json!({ "id": "2", "name": "ab shop" }),
                json!({ "id": "3", "name": "abc shop" }),
                json!({ "id": "4", "name": "other" }),
            ])
            .unwrap();
        Self {
            inner: InMemoryBackend::new().with_collection(shops),
            delays: Mutex::new(delays.iter().map(|ms| Duration::from_millis(*ms)).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, path: &str, query: &QueryString) -> QueryResult<Value> {
        self.requests.lock().unwrap().push(query.to_string());
        let delay = self.delays.lock().unwrap().pop_front().unwrap_or_default();
        tokio::time::sleep(delay).await;
        self.inner.get(path, query).await
    }

    async fn post(&self, path: &str, body: Value) -> QueryResult<Value> {
        self.inner.post(path, body).await
    }

    async fn put(&self, path: &str, body: Value) -> QueryResult<Value> {
        self.inner.put(path, body).await
    }

    async fn delete(&self, path: &str) -> QueryResult<()> {
        self.inner.delete(path).await
    }
}

fn setup(delays: &[u64]) -> (Arc<ScriptedTransport>, Arc<ListController>) {
    setup_with_config(delays, QueryConfig::default_config())
}

fn setup_with_config(
    delays: &[u64],
    mut config: QueryConfig,
) -> (Arc<ScriptedTransport>, Arc<ListController>) {
    let transport = Arc::new(ScriptedTransport::new(delays));
    config.endpoints = vec![EndpointConfig::new("shops", "shops").with_search_fields(["name"])];
    let client = Arc::new(ListClient::new(transport.clone(), config));
    let controller = ListController::new(client, "shops").unwrap();
    (transport, controller)
}

fn loaded_names(state: &ListState) -> Vec<String> {
    state
        .result()
        .map(|r| {
            r.items
                .iter()
                .map(|i| i["name"].as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

async fn wait_for_loaded(rx: &mut tokio::sync::watch::Receiver<ListState>) -> ListState {
    loop {
        {
            let state = rx.borrow_and_update();
            if matches!(*state, ListState::Loaded { .. } | ListState::Failed { .. }) {
                return state.clone();
            }
        }
        rx.changed().await.unwrap();
    }
}

// =============================================================================
// Debounced search
// =============================================================================

mod debounce_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rapid_input_fires_one_query_for_last_value() {
        let (transport, controller) = setup(&[]);
        let mut states = controller.subscribe();
        let search = controller.attach_search_with_delay(Duration::from_millis(500));

        search.on_input("a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        search.on_input("ab");
        tokio::time::sleep(Duration::from_millis(100)).await;
        search.on_input("abc");
        assert_eq!(search.state(), DebounceState::Pending);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let state = wait_for_loaded(&mut states).await;

        assert_eq!(search.fired_count(), 1);
        assert_eq!(search.state(), DebounceState::Fired);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains("tolower('abc')"));
        assert_eq!(loaded_names(&state), vec!["abc shop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_input_fires_each_value() {
        let (transport, controller) = setup(&[]);
        let search = controller.attach_search_with_delay(Duration::from_millis(500));

        search.on_input("a");
        tokio::time::sleep(Duration::from_millis(700)).await;
        search.on_input("ab");
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(search.fired_count(), 2);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_uses_configured_interval() {
        let mut config = QueryConfig::default_config();
        config.debounce_ms = 300;
        let (transport, controller) = setup_with_config(&[], config);
        let search = controller.attach_search();

        search.on_input("abc");
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(search.state(), DebounceState::Pending);
        assert!(transport.requests().is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(search.fired_count(), 1);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_interval_is_half_a_second() {
        let (transport, controller) = setup(&[]);
        let search = controller.attach_search();

        search.on_input("abc");
        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(search.fired_count(), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(search.fired_count(), 1);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_input() {
        let (transport, controller) = setup(&[]);
        let search = controller.attach_search_with_delay(Duration::from_millis(500));

        search.on_input("abc");
        tokio::time::sleep(Duration::from_millis(200)).await;
        search.cancel();
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert_eq!(search.state(), DebounceState::Idle);
        assert_eq!(search.fired_count(), 0);
        assert!(transport.requests().is_empty());
        assert_eq!(controller.state(), ListState::Idle);
    }
}

// =============================================================================
// Stale result discarding
// =============================================================================

mod stale_result_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_slow_superseded_response_is_discarded() {
        let (_transport, controller) = setup(&[200, 10]);

        controller.set_search("a");
        let first = controller.issue();
        controller.set_search("abc");
        let second = controller.issue();

        let (stale, latest) = tokio::join!(controller.run(first), controller.run(second));

        assert!(stale.is_none());
        let latest = latest.unwrap().unwrap();
        assert_eq!(latest.total_count, 1);
        assert_eq!(loaded_names(&controller.state()), vec!["abc shop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_superseded_response_never_shows() {
        let (_transport, controller) = setup(&[10, 200]);

        controller.set_search("a");
        let first = controller.spawn_load();
        controller.set_search("abc");
        let second = controller.spawn_load();

        first.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(controller.state().is_loading());

        second.await.unwrap();
        assert_eq!(loaded_names(&controller.state()), vec!["abc shop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_change_supersedes_search() {
        let (_transport, controller) = setup(&[100, 0]);

        controller.set_search("shop");
        let search_ticket = controller.issue();
        controller.set_page(2);
        let page_ticket = controller.issue();

        let (stale, current) = tokio::join!(
            controller.run(search_ticket),
            controller.run(page_ticket)
        );
        assert!(stale.is_none());
        let current = current.unwrap().unwrap();
        assert_eq!(current.total_count, 3);
        assert!(current.items.is_empty());
    }
}

// =============================================================================
// Failures
// =============================================================================

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_bad_request_surfaces_failed_state() {
        let (transport, controller) = setup(&[]);
        controller.set_filters(vec![FilterPredicate::equals("display name", "x")]);

        let outcome = controller.load().await.unwrap();
        let err = outcome.unwrap_err();
        assert!(err.is_network_failure());
        assert_eq!(err.error_code(), "REQUEST_REJECTED");

        match controller.state() {
            ListState::Failed { code, .. } => assert_eq!(code, "REQUEST_REJECTED"),
            other => panic!("unexpected state: {:?}", other),
        }
        assert_eq!(transport.requests().len(), 1);
    }
}
