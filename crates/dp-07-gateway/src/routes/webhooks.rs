//! Webhook endpoints for the two chat platforms.
//!
//! The adapter boundary in front of this service verifies source
//! signatures and stamps `x-webhook-verified: true`; payloads arriving
//! without the stamp are refused before any processing.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::intake::process_inbound;
use crate::state::AppState;
use crate::wire::{BotUpdate, WebChatPayload};

const VERIFIED_HEADER: &str = "x-webhook-verified";

fn is_verified(headers: &HeaderMap) -> bool {
    headers
        .get(VERIFIED_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "true")
        .unwrap_or(false)
}

/// Bot-platform update intake.
pub async fn bot_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<BotUpdate>,
) -> ApiResult<Json<serde_json::Value>> {
    let verified = is_verified(&headers);
    let Some(inbound) = update.normalize(verified) else {
        // Service messages, joins, etc. are acknowledged and dropped.
        return Ok(Json(json!({ "ok": true, "skipped": true })));
    };
    let processed = process_inbound(&state, inbound).await.map_err(ApiError)?;
    Ok(Json(json!({ "ok": true, "processed": processed })))
}

/// Web-chat gateway intake; one request may batch several messages.
pub async fn webchat_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<WebChatPayload>,
) -> ApiResult<Json<serde_json::Value>> {
    let verified = is_verified(&headers);
    let mut processed = 0usize;
    for message in &payload.messages {
        let inbound = message.normalize(verified);
        match process_inbound(&state, inbound).await {
            Ok(true) => processed += 1,
            Ok(false) => {}
            Err(e) => {
                // A poisoned message must not block the rest of the batch.
                warn!(message_id = %message.message_id, error = %e, "webchat message failed");
            }
        }
    }
    Ok(Json(json!({ "ok": true, "processed": processed })))
}
