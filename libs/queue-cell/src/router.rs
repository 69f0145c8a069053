use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn create_queue_router(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        // Front desk
        .route("/appointments", post(handlers::register_appointment))
        .route("/appointments/dashboard", get(handlers::get_dashboard))
        .route(
            "/appointments/{appointment_id}/status/{status}",
            post(handlers::update_status),
        )
        .route("/appointments/{appointment_id}/call", post(handlers::call_patient))
        .route("/appointments/{appointment_id}/audit", get(handlers::get_audit_history))
        // ETA
        .route("/eta/preview", get(handlers::preview_eta))
        .route("/eta/predict", get(handlers::predict_eta))
        .route("/reschedule", post(handlers::reschedule_queue))
        .route("/display", get(handlers::get_staff_display))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let public_routes = Router::new().route("/h/{slug}/display", get(handlers::get_public_display));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state)
}
