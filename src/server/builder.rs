//! ServerBuilder for fluent API to build the reference list server

use super::handlers::AppState;
use super::router::build_list_routes;
use crate::core::events::EventBus;
use crate::storage::{InMemoryBackend, InMemoryCollection};
use anyhow::{Result, bail};
use axum::Router;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for an HTTP server exposing in-memory collections as list endpoints
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_collection(InMemoryCollection::new("shops").seed(shops)?)
///     .with_collection(InMemoryCollection::legacy("tickets"))
///     .build()?;
/// ```
pub struct ServerBuilder {
    collections: Vec<InMemoryCollection>,
    custom_routes: Vec<Router>,
    event_bus: Option<EventBus>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            collections: Vec::new(),
            custom_routes: Vec::new(),
            event_bus: None,
        }
    }

    /// Register a collection, exposed under `/{name}`
    pub fn with_collection(mut self, collection: InMemoryCollection) -> Self {
        self.collections.push(collection);
        self
    }

    /// Add custom routes to the server
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Enable the event bus for mutation notifications
    ///
    /// Every registered collection publishes its writes on the bus; subscribe
    /// through [`event_bus`](Self::event_bus) before building.
    pub fn with_event_bus(mut self, capacity: usize) -> Self {
        self.event_bus = Some(EventBus::new(capacity));
        self
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.event_bus.as_ref()
    }

    /// Build the backend serving the registered collections
    pub fn build_backend(&mut self) -> Result<InMemoryBackend> {
        let mut seen = HashSet::new();
        let mut backend = InMemoryBackend::new();
        for collection in std::mem::take(&mut self.collections) {
            if !seen.insert(collection.name().to_string()) {
                bail!("Collection '{}' registered twice", collection.name());
            }
            let collection = match &self.event_bus {
                Some(bus) => collection.with_events(bus.clone()),
                None => collection,
            };
            backend = backend.with_collection(collection);
        }
        Ok(backend)
    }

    /// Build the final router
    pub fn build(mut self) -> Result<Router> {
        let backend = self.build_backend()?;
        tracing::debug!(collections = ?backend.collection_names(), "Building list routes");

        let state = AppState {
            backend: Arc::new(backend),
        };
        let mut app = Router::new();
        for routes in self.custom_routes {
            app = app.merge(routes);
        }
        Ok(app.merge(build_list_routes(state)))
    }

    /// Serve the application with graceful shutdown
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
