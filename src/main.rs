use std::sync::Arc;

use quickurl::{
    config::Config, logger::ActivityLog, registry::UrlRegistry, router, store::SqliteStore,
    AppState,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🚀 Starting QuickURL API server...");

    let config = Config::from_env()?;

    // Initialize the key-value store, running migrations
    let store = SqliteStore::connect(&config.database_url).await?;
    info!("Store ready at {}", config.database_url);

    let registry = UrlRegistry::builder(Arc::new(store))
        .log(Arc::new(ActivityLog::new()))
        .options(config.registry_options())
        .load()
        .await;

    let bind_addr = config.bind_addr.clone();
    let base_address = config.base_address.clone();
    let app = router(Arc::new(AppState::new(registry, config)));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    println!("📡 Server running on http://{}", bind_addr);
    println!("🔗 Short links are issued under {}", base_address);
    println!("📚 API Endpoints:");
    println!("  POST   /shorten        - Create short URL");
    println!("  POST   /shorten/batch  - Create up to 5 short URLs");
    println!("  GET    /urls           - List all URLs");
    println!("  GET    /urls/:code     - Get URL info");
    println!("  DELETE /urls/:code     - Delete URL");
    println!("  GET    /stats          - Click statistics");
    println!("  GET    /logs           - Activity log");
    println!("  GET    /:code          - Redirect to original URL");

    axum::serve(listener, app).await?;
    Ok(())
}
