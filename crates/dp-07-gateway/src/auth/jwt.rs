//! JWT access tokens and rotating refresh tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use shared_types::{DispatchError, DispatchResult, Role, StationId, UserId};
use uuid::Uuid;

/// Refresh-token lifetime.
const REFRESH_TTL_DAYS: i64 = 14;

fn refresh_key(jti: &str) -> String {
    format!("refresh_token:{jti}")
}

/// Access-token payload. `station_id` scopes panel sessions to one
/// station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub station_id: Option<StationId>,
    pub role: Role,
    pub exp: i64,
    /// `access` or `refresh`.
    pub kind: String,
    /// Refresh tokens carry their Redis handle here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// An access + refresh pair returned to the panel.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

fn algorithm(name: &str) -> Algorithm {
    match name {
        "HS384" => Algorithm::HS384,
        "HS512" => Algorithm::HS512,
        _ => Algorithm::HS256,
    }
}

/// Issues a fresh access + refresh pair and registers the refresh jti in
/// Redis (single use).
pub async fn issue_token_pair(
    redis: &mut ConnectionManager,
    secret: &str,
    alg_name: &str,
    access_ttl_min: i64,
    user_id: UserId,
    station_id: Option<StationId>,
    role: Role,
) -> DispatchResult<TokenPair> {
    let now = Utc::now();
    let header = Header::new(algorithm(alg_name));
    let key = EncodingKey::from_secret(secret.as_bytes());

    let access_claims = Claims {
        user_id,
        station_id,
        role,
        exp: (now + Duration::minutes(access_ttl_min)).timestamp(),
        kind: "access".to_string(),
        jti: None,
    };
    let access_token = encode(&header, &access_claims, &key)
        .map_err(|e| DispatchError::Internal(format!("jwt encode: {e}")))?;

    let jti = Uuid::now_v7().to_string();
    let refresh_claims = Claims {
        user_id,
        station_id,
        role,
        exp: (now + Duration::days(REFRESH_TTL_DAYS)).timestamp(),
        kind: "refresh".to_string(),
        jti: Some(jti.clone()),
    };
    let refresh_token = encode(&header, &refresh_claims, &key)
        .map_err(|e| DispatchError::Internal(format!("jwt encode: {e}")))?;

    let ttl = (REFRESH_TTL_DAYS * 24 * 3600) as u64;
    redis
        .set_ex::<_, _, ()>(refresh_key(&jti), user_id, ttl)
        .await
        .map_err(|e| DispatchError::Internal(format!("redis: {e}")))?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Decodes and validates any token of ours.
pub fn decode_token(secret: &str, alg_name: &str, token: &str) -> DispatchResult<Claims> {
    let validation = Validation::new(algorithm(alg_name));
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| DispatchError::InvalidToken)
}

/// Exchanges a refresh token for a new pair. The old token's jti is
/// consumed atomically (GETDEL), so the exchange succeeds at most once;
/// a replayed token fails with `InvalidToken`.
pub async fn rotate_refresh(
    redis: &mut ConnectionManager,
    secret: &str,
    alg_name: &str,
    access_ttl_min: i64,
    refresh_token: &str,
) -> DispatchResult<TokenPair> {
    let claims = decode_token(secret, alg_name, refresh_token)?;
    if claims.kind != "refresh" {
        return Err(DispatchError::InvalidToken);
    }
    let jti = claims.jti.as_deref().ok_or(DispatchError::InvalidToken)?;

    let stored: Option<i64> = redis::cmd("GETDEL")
        .arg(refresh_key(jti))
        .query_async(redis)
        .await
        .map_err(|e| DispatchError::Internal(format!("redis: {e}")))?;
    if stored != Some(claims.user_id) {
        return Err(DispatchError::InvalidToken);
    }

    issue_token_pair(
        redis,
        secret,
        alg_name,
        access_ttl_min,
        claims.user_id,
        claims.station_id,
        claims.role,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_round_trip() {
        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(b"test-secret");
        let claims = Claims {
            user_id: 7,
            station_id: Some(3),
            role: Role::StationOwner,
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            kind: "access".to_string(),
            jti: None,
        };
        let token = encode(&header, &claims, &key).unwrap();
        let decoded = decode_token("test-secret", "HS256", &token).unwrap();
        assert_eq!(decoded.user_id, 7);
        assert_eq!(decoded.station_id, Some(3));
        assert_eq!(decoded.role, Role::StationOwner);
    }

    #[test]
    fn test_expired_token_rejected() {
        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(b"test-secret");
        let claims = Claims {
            user_id: 7,
            station_id: None,
            role: Role::Admin,
            exp: (Utc::now() - Duration::hours(1)).timestamp(),
            kind: "access".to_string(),
            jti: None,
        };
        let token = encode(&header, &claims, &key).unwrap();
        assert!(matches!(
            decode_token("test-secret", "HS256", &token),
            Err(DispatchError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(b"test-secret");
        let claims = Claims {
            user_id: 7,
            station_id: None,
            role: Role::Admin,
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            kind: "access".to_string(),
            jti: None,
        };
        let token = encode(&header, &claims, &key).unwrap();
        assert!(decode_token("other-secret", "HS256", &token).is_err());
    }
}
