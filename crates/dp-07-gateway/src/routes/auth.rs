//! Panel auth endpoints: OTP request/verify and refresh rotation.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use shared_types::{DispatchError, OutboundContent};

use dp_01_validation::normalize_phone;
use dp_02_storage::{db_err, outbox, stations, users};

use crate::auth::{issue_token_pair, request_otp, rotate_refresh, verify_otp};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PhoneBody {
    pub phone: String,
}

/// `POST /auth/request-otp` — issues a code and delivers it over the
/// user's chat channel via the outbox.
pub async fn request_otp_route(
    State(state): State<AppState>,
    Json(body): Json<PhoneBody>,
) -> ApiResult<Json<Value>> {
    let phone = normalize_phone(&body.phone).map_err(ApiError)?;
    let user = {
        let mut conn = state.pool.acquire().await.map_err(db_err).map_err(ApiError)?;
        users::get_user_by_phone(&mut conn, &phone)
            .await
            .map_err(ApiError)?
            .ok_or(ApiError(DispatchError::WrongOtp))?
    };

    let mut redis = state.redis.clone();
    let code = request_otp(&mut redis, user.id, &phone, state.config.otp_ttl_seconds)
        .await
        .map_err(ApiError)?;

    let content = OutboundContent {
        text: format!("קוד הכניסה שלך: <code>{code}</code>"),
        keyboard: None,
        media: None,
    };
    let mut conn = state.pool.acquire().await.map_err(db_err).map_err(ApiError)?;
    outbox::enqueue(
        &mut conn,
        user.platform,
        &user.chat_id,
        "panel_otp",
        &content,
        None,
        state.config.outbox_max_retries,
    )
    .await
    .map_err(ApiError)?;

    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct VerifyBody {
    pub phone: String,
    pub code: String,
}

/// `POST /auth/verify-otp` — one-time verification; issues the token pair.
pub async fn verify_otp_route(
    State(state): State<AppState>,
    Json(body): Json<VerifyBody>,
) -> ApiResult<Json<Value>> {
    let phone = normalize_phone(&body.phone).map_err(ApiError)?;
    let (user, station) = {
        let mut conn = state.pool.acquire().await.map_err(db_err).map_err(ApiError)?;
        let user = users::get_user_by_phone(&mut conn, &phone)
            .await
            .map_err(ApiError)?
            .ok_or(ApiError(DispatchError::WrongOtp))?;
        let station = stations::station_for_owner(&mut conn, user.id)
            .await
            .map_err(ApiError)?;
        (user, station)
    };

    let mut redis = state.redis.clone();
    verify_otp(&mut redis, user.id, &body.code)
        .await
        .map_err(ApiError)?;

    let pair = issue_token_pair(
        &mut redis,
        &state.config.jwt_secret_key,
        &state.config.jwt_algorithm,
        state.config.jwt_access_ttl_min,
        user.id,
        station.map(|s| s.id),
        user.role,
    )
    .await
    .map_err(ApiError)?;

    Ok(Json(json!({
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
    })))
}

#[derive(Deserialize)]
pub struct RefreshBody {
    pub refresh_token: String,
}

/// `POST /auth/refresh` — rotates the refresh token; the old one is
/// revoked and a replay fails.
pub async fn refresh_route(
    State(state): State<AppState>,
    Json(body): Json<RefreshBody>,
) -> ApiResult<Json<Value>> {
    let mut redis = state.redis.clone();
    let pair = rotate_refresh(
        &mut redis,
        &state.config.jwt_secret_key,
        &state.config.jwt_algorithm,
        state.config.jwt_access_ttl_min,
        &body.refresh_token,
    )
    .await
    .map_err(ApiError)?;

    Ok(Json(json!({
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
    })))
}
