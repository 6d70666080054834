use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::handlers::{
    get_insights, get_property_details, get_trends, get_versus, get_view, health_check,
    run_sync, AppState,
};

pub fn create_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/properties/{id}/views/{view}", get(get_view))
        .route("/api/properties/{id}/versus", get(get_versus))
        .route("/api/properties/{id}/insights", get(get_insights))
        .route("/api/properties/{id}/details", get(get_property_details))
        .route("/api/properties/{id}/trends", get(get_trends))
        .route("/api/sync", post(run_sync))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
