//! Gateway middleware: correlation-ID scoping and admin-key checks.

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;
use tracing::Instrument;

use dispatch_telemetry::{correlation_scope, CorrelationId, CORRELATION_HEADER};
use shared_types::{DispatchError, DispatchResult};

/// Accepts an incoming `x-correlation-id` or mints a UUID v7, runs the rest
/// of the request inside the correlation scope, and echoes the ID on the
/// response.
pub async fn correlation_middleware(request: Request<Body>, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| CorrelationId::parse(s).ok())
        .unwrap_or_default();

    let span = tracing::info_span!(
        "request",
        correlation_id = %correlation_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = correlation_scope(correlation_id, next.run(request))
        .instrument(span)
        .await;
    if let Ok(value) = correlation_id.to_string().parse() {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

/// Constant-time admin-key check for the debug surface.
pub fn require_admin_key(headers: &HeaderMap, expected: &str) -> DispatchResult<()> {
    if expected.is_empty() {
        return Err(DispatchError::InvalidAdminKey);
    }
    let provided = headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        Err(DispatchError::InvalidAdminKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_key_match() {
        let mut headers = HeaderMap::new();
        headers.insert("x-admin-key", "secret".parse().unwrap());
        assert!(require_admin_key(&headers, "secret").is_ok());
    }

    #[test]
    fn test_admin_key_mismatch() {
        let mut headers = HeaderMap::new();
        headers.insert("x-admin-key", "wrong".parse().unwrap());
        assert!(require_admin_key(&headers, "secret").is_err());
    }

    #[test]
    fn test_missing_key_rejected() {
        assert!(require_admin_key(&HeaderMap::new(), "secret").is_err());
    }

    #[test]
    fn test_unconfigured_key_rejects_everything() {
        let mut headers = HeaderMap::new();
        headers.insert("x-admin-key", "".parse().unwrap());
        assert!(require_admin_key(&headers, "").is_err());
    }
}
