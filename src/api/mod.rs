pub mod health;
pub mod positions;

use crate::engine::PositionTracker;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<PositionTracker>,
}

impl AppState {
    pub fn new(tracker: Arc<PositionTracker>) -> Self {
        Self { tracker }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/positions/current", get(positions::get_current_positions))
        .route("/v1/positions/past", get(positions::get_past_positions))
        .layer(cors)
        .with_state(state)
}
