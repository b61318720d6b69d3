//! # QuickURL
//!
//! A small URL shortener: generated or custom short codes with a validity
//! window, click recording and an in-memory activity log. The whole registry is
//! kept as one JSON snapshot in a key-value store.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod logger;
pub mod models;
pub mod registry;
pub mod stats;
pub mod store;
pub mod token;

use config::Config;
use registry::UrlRegistry;

pub struct AppState {
    pub registry: UrlRegistry,
    pub config: Config,
}

impl AppState {
    pub fn new(registry: UrlRegistry, config: Config) -> Self {
        Self { registry, config }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::health_check))
        .route("/health", get(handlers::health_check))
        .route("/shorten", post(handlers::create_short_url))
        .route("/shorten/batch", post(handlers::create_batch))
        .route("/urls", get(handlers::list_urls))
        .route(
            "/urls/:code",
            get(handlers::get_url_info).delete(handlers::delete_url),
        )
        .route("/stats", get(handlers::statistics))
        .route(
            "/logs",
            get(handlers::list_logs).delete(handlers::clear_logs),
        )
        .route("/:code", get(handlers::redirect_url))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
