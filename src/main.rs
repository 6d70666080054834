use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use vantage::analytics::{Aggregator, CachePolicy, Dashboard};
use vantage::api::{create_api_router, AppState};
use vantage::auth::{StaticTokenProvider, TokenProvider};
use vantage::config::{Config, DatabaseBackend};
use vantage::insights::{HttpTextGenerator, InsightGenerator, TextGenerator};
use vantage::report::{HttpReportingClient, PropertyCache, ReportingClient};
use vantage::storage::{MemoryStore, PostgresStore, ReportCache, SqliteStore, Store};
use vantage::sync::SyncJob;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize the document store
    let store: Arc<dyn Store> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite store: {}", config.database.url);
            Arc::new(SqliteStore::new(&config.database.url).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL store: {}", config.database.url);
            Arc::new(PostgresStore::new(&config.database.url).await?)
        }
        DatabaseBackend::Memory => {
            info!("Using in-memory store (data will not survive restarts)");
            Arc::new(MemoryStore::new())
        }
    };

    info!("Initializing store...");
    store.init().await?;
    info!("Store initialized successfully");

    // Upstream reporting boundary
    let client: Arc<dyn ReportingClient> = Arc::new(HttpReportingClient::new(
        config.reporting.base_url.clone(),
        config.reporting.timeout(),
    )?);
    let tokens: Arc<dyn TokenProvider> = Arc::new(StaticTokenProvider::from_env()?);

    // Aggregation layer and its cache
    let cache = ReportCache::new(Arc::clone(&store));
    let policy = CachePolicy::new(Duration::from_secs(config.cache.report_ttl_secs));
    let dashboard = Arc::new(Dashboard::new(
        Aggregator::new(Arc::clone(&client), Arc::clone(&tokens)),
        cache.clone(),
        Arc::clone(&store),
        policy,
    ));

    // Insight lane
    let generator: Arc<dyn TextGenerator> = Arc::new(HttpTextGenerator::new(&config.insights)?);
    let insights = Arc::new(InsightGenerator::new(
        Arc::clone(&dashboard),
        generator,
        cache.clone(),
        Duration::from_secs(config.cache.insight_ttl_secs),
    ));

    // Daily sync, independent of the read-path cache
    let sync = Arc::new(SyncJob::new(
        Aggregator::new(Arc::clone(&client), Arc::clone(&tokens)),
        Arc::clone(&store),
    ));

    // Property display metadata
    let properties = Arc::new(PropertyCache::new(
        Arc::clone(&client),
        Arc::clone(&tokens),
        1000,
        Duration::from_secs(3600),
    ));

    let state = Arc::new(AppState {
        dashboard,
        insights,
        sync,
        properties,
        store,
    });
    let router = create_api_router(state);

    let addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 API server listening on http://{}", addr);
    info!("   - Report views at http://{}/api/properties/{{id}}/views/...", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
