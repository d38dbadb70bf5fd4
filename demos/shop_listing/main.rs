//! Shop listing example: a reference server and an HTTP client reconciling its pages
//!
//! `shops` honors the query protocol; `tickets` is a legacy endpoint that
//! ignores it, so its pages are computed from a snapshot instead.

use anyhow::Result;
use market_query::prelude::*;
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const STATUSES: [&str; 7] = [
    "PENDING", "APPROVED", "APPROVED", "BANNED", "PENDING", "APPROVED", "PENDING",
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,market_query=debug")),
        )
        .init();

    println!("🛒 market-query shop listing example\n");

    let shops = InMemoryCollection::new("shops").seed(STATUSES.iter().enumerate().map(|(i, status)| {
        json!({
            "id": format!("s{}", i + 1),
            "name": format!("Shop {}", i + 1),
            "status": status,
            "createdAt": format!("2024-03-{:02}T08:00:00Z", i + 1),
        })
    }))?;
    let tickets = InMemoryCollection::legacy("tickets").seed(vec![
        json!({ "id": 1, "title": "Refund request", "content": "Order arrived broken", "email": "an@example.com" }),
        json!({ "id": 2, "title": "Login issue", "content": "Cannot reset password", "email": "binh@example.com" }),
        json!({ "id": 3, "title": "Broken link", "content": "Shop page 404", "email": "chi@example.com" }),
    ])?;

    let app = ServerBuilder::new()
        .with_collection(shops)
        .with_collection(tickets)
        .build()?;
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Server stopped");
        }
    });
    println!("📡 Reference server on http://{}\n", addr);

    let mut config = QueryConfig::default_config();
    config.base_url = format!("http://{}", addr);
    let transport = HttpTransport::from_config(&config)?;
    let client = Arc::new(ListClient::new(Arc::new(transport), config));

    let approved = ListQuery::new()
        .filter(FilterPredicate::equals("status", Literal::enumeration("APPROVED")))
        .sort_by(SortSpec::asc("createdAt"))
        .page(1, 2)
        .with_count();
    println!("➡️  GET shops?{}", approved.to_query_string());

    let page = client.fetch("shops", &approved).await?;
    for shop in &page.items {
        println!("   • {} ({})", shop["name"], shop["status"]);
    }
    if let Some(page_request) = &approved.page {
        let meta = page.pagination(page_request);
        println!(
            "   page {}/{}, {} approved shops\n",
            meta.page, meta.total_pages, meta.total
        );
    }

    let stats = client.statistics("shops", "status").await?;
    println!("📊 Shops per status: {:?}\n", stats);

    let controller = ListController::new(Arc::clone(&client), "tickets")?;
    let mut states = controller.subscribe();
    let search = controller.attach_search();
    for prefix in ["b", "br", "bro", "broken"] {
        search.on_input(prefix);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    loop {
        states.changed().await?;
        let state = states.borrow_and_update().clone();
        if let ListState::Loaded { result, .. } = state {
            println!("🔎 Tickets matching \"broken\": {}", result.total_count);
            for ticket in &result.items {
                println!("   • #{} {}", ticket["id"], ticket["title"]);
            }
            break;
        }
    }
    println!("\n✅ {} debounced search request(s) sent", search.fired_count());

    Ok(())
}
