//! Route assembly.

pub mod auth;
pub mod debug;
pub mod health;
pub mod webhooks;

use axum::http::header::HeaderValue;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::middleware::correlation_middleware;
use crate::state::AppState;

/// Builds the full gateway router.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/webhooks/bot", post(webhooks::bot_webhook))
        .route("/webhooks/webchat", post(webhooks::webchat_webhook))
        .route("/auth/request-otp", post(auth::request_otp_route))
        .route("/auth/verify-otp", post(auth::verify_otp_route))
        .route("/auth/refresh", post(auth::refresh_route))
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/debug/circuit-breakers", get(debug::circuit_breakers))
        .route("/debug/outbox/summary", get(debug::outbox_summary))
        .route("/debug/outbox/messages", get(debug::outbox_messages))
        .route("/debug/outbox/messages/:id/retry", post(debug::outbox_retry))
        .route("/debug/users/:id/state", get(debug::user_state))
        .route("/debug/users/:id/force-state", post(debug::force_state))
        .layer(axum::middleware::from_fn(correlation_middleware))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(parsed)
}
