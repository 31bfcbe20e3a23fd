//! Liveness and readiness probes.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Probe timeout: health checks must stay cheap.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Liveness: always cheap, no dependency calls.
pub async fn liveness() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Readiness: probes the database, Redis, and the web-chat gateway.
/// The outbox queue rides on Postgres, so the database probe covers the
/// worker broker too. Failures surface as `degraded` with sanitized
/// per-dependency diagnostics; connection strings and secrets never appear
/// in output.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = probe_database(&state).await;
    let redis = probe_redis(&state).await;
    let webchat = probe_webchat(&state).await;

    let healthy = database.1 && redis.1 && webchat.1;
    let status = if healthy { "ready" } else { "degraded" };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(json!({
            "status": status,
            "checks": {
                "database": database.0,
                "redis": redis.0,
                "webchat_gateway": webchat.0,
            }
        })),
    )
}

async fn probe_database(state: &AppState) -> (Value, bool) {
    let result = tokio::time::timeout(PROBE_TIMEOUT, async {
        sqlx::query("SELECT 1").execute(&state.pool).await
    })
    .await;
    match result {
        Ok(Ok(_)) => (json!({ "status": "up" }), true),
        Ok(Err(_)) => (json!({ "status": "down", "reason": "query failed" }), false),
        Err(_) => (json!({ "status": "down", "reason": "timeout" }), false),
    }
}

async fn probe_redis(state: &AppState) -> (Value, bool) {
    let mut redis = state.redis.clone();
    let result = tokio::time::timeout(PROBE_TIMEOUT, async {
        redis::cmd("PING").query_async::<String>(&mut redis).await
    })
    .await;
    match result {
        Ok(Ok(_)) => (json!({ "status": "up" }), true),
        Ok(Err(_)) => (json!({ "status": "down", "reason": "ping failed" }), false),
        Err(_) => (json!({ "status": "down", "reason": "timeout" }), false),
    }
}

async fn probe_webchat(state: &AppState) -> (Value, bool) {
    let url = format!("{}/health", state.config.webchat_base_url);
    let result = tokio::time::timeout(PROBE_TIMEOUT, state.http.get(&url).send()).await;
    match result {
        Ok(Ok(response)) if response.status().is_success() => (json!({ "status": "up" }), true),
        Ok(Ok(response)) => (
            json!({ "status": "down", "reason": format!("HTTP {}", response.status().as_u16()) }),
            false,
        ),
        Ok(Err(_)) => (json!({ "status": "down", "reason": "unreachable" }), false),
        Err(_) => (json!({ "status": "down", "reason": "timeout" }), false),
    }
}
