//! Admin debug surface, guarded by the shared admin key.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use shared_types::{DispatchError, OutboxStatus, Platform};

use dp_02_storage::{db_err, outbox};
use dp_06_outbox::breaker_stats;

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_admin_key;
use crate::state::AppState;

fn guard(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    require_admin_key(headers, &state.config.admin_api_key).map_err(ApiError)
}

/// `GET /debug/circuit-breakers`
pub async fn circuit_breakers(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    guard(&state, &headers)?;
    Ok(Json(json!({ "breakers": breaker_stats() })))
}

/// `GET /debug/outbox/summary`
pub async fn outbox_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    guard(&state, &headers)?;
    let mut conn = state.pool.acquire().await.map_err(db_err).map_err(ApiError)?;
    let counts = outbox::summary(&mut conn).await.map_err(ApiError)?;
    let summary: serde_json::Map<String, Value> = counts
        .into_iter()
        .map(|(status, count)| (status, json!(count)))
        .collect();
    Ok(Json(json!({ "summary": summary })))
}

#[derive(Deserialize)]
pub struct OutboxQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

/// `GET /debug/outbox/messages?status=&limit=`
pub async fn outbox_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OutboxQuery>,
) -> ApiResult<Json<Value>> {
    guard(&state, &headers)?;
    let status = match query.status.as_deref() {
        Some(s) => Some(OutboxStatus::parse(s).ok_or_else(|| {
            ApiError(DispatchError::ValidationError {
                field: "status".to_string(),
                reason: format!("unknown status {s}"),
            })
        })?),
        None => None,
    };
    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    let mut conn = state.pool.acquire().await.map_err(db_err).map_err(ApiError)?;
    let messages = outbox::recent(&mut conn, status, limit).await.map_err(ApiError)?;
    Ok(Json(json!({ "messages": messages })))
}

/// `POST /debug/outbox/messages/:id/retry` — only failed rows flip back to
/// pending.
pub async fn outbox_retry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    guard(&state, &headers)?;
    let mut conn = state.pool.acquire().await.map_err(db_err).map_err(ApiError)?;
    let retried = outbox::retry_failed(&mut conn, id).await.map_err(ApiError)?;
    if !retried {
        return Err(ApiError(DispatchError::ValidationError {
            field: "id".to_string(),
            reason: "message is not in failed status".to_string(),
        }));
    }
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct PlatformQuery {
    pub platform: Option<String>,
}

fn parse_platform(raw: Option<&str>) -> ApiResult<Platform> {
    let raw = raw.unwrap_or("bot");
    Platform::parse(raw).ok_or_else(|| {
        ApiError(DispatchError::ValidationError {
            field: "platform".to_string(),
            reason: format!("unknown platform {raw}"),
        })
    })
}

/// `GET /debug/users/:id/state?platform=`
pub async fn user_state(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Query(query): Query<PlatformQuery>,
) -> ApiResult<Json<Value>> {
    guard(&state, &headers)?;
    let platform = parse_platform(query.platform.as_deref())?;
    let session = state
        .engine
        .session(user_id, platform)
        .await
        .map_err(ApiError)?;
    Ok(Json(json!({
        "user_id": session.user_id,
        "platform": session.platform,
        "current_state": session.current_state,
        "context_data": session.context_data,
        "updated_at": session.updated_at,
    })))
}

#[derive(Deserialize)]
pub struct ForceStateBody {
    pub new_state: String,
    pub platform: Option<String>,
    #[serde(default)]
    pub clear_context: bool,
}

/// `POST /debug/users/:id/force-state` — bypasses transition validation.
pub async fn force_state(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Json(body): Json<ForceStateBody>,
) -> ApiResult<Json<Value>> {
    guard(&state, &headers)?;
    let platform = parse_platform(body.platform.as_deref())?;
    state
        .engine
        .force_state(user_id, platform, &body.new_state, body.clear_context)
        .await
        .map_err(ApiError)?;
    Ok(Json(json!({ "ok": true, "new_state": body.new_state })))
}
