use std::sync::Arc;

use axum::{routing::get, Router};

use queue_cell::create_queue_router;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic queue API is running!" }))
        .nest("/queue", create_queue_router(state))
}
