//! DispatchError → HTTP response mapping.
//!
//! End users and panel clients get the stable code plus the localized
//! message; internals (SQL text, upstream bodies, stack context) never
//! leave the process — they are logged with the correlation id instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shared_types::DispatchError;
use tracing::{error, warn};

/// Wrapper so handlers can use `?` on `DispatchResult`.
pub struct ApiError(pub DispatchError);

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        Self(e)
    }
}

fn status_for(e: &DispatchError) -> StatusCode {
    match e.code() / 1000 {
        1 => StatusCode::BAD_REQUEST,
        2 => StatusCode::NOT_FOUND,
        3 => StatusCode::CONFLICT,
        4 => StatusCode::UNAUTHORIZED,
        5 => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(code = self.0.code(), error = %self.0, "internal error");
        } else {
            warn!(code = self.0.code(), error = %self.0, "request failed");
        }
        let body = json!({
            "error": {
                "code": self.0.code(),
                "message": self.0.user_message(),
            }
        });
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ranges() {
        assert_eq!(
            status_for(&DispatchError::InvalidPhone("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&DispatchError::DeliveryNotFound),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&DispatchError::DuplicateCharge { delivery_id: 1 }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_for(&DispatchError::WrongOtp), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(&DispatchError::ServiceUnavailable { service: "x".into() }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&DispatchError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
