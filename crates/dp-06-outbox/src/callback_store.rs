//! Short-token indirection for bot callback payloads.
//!
//! The bot platform caps callback data at 64 bytes. Longer payloads are
//! stored in Redis under a short random token with a 24–48 h TTL; the
//! webhook resolves the token back on button press. An expired token maps
//! to a user-visible "button expired" message rather than dispatching the
//! raw token into the state machine.

use rand::rngs::OsRng;
use rand::RngCore;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use shared_types::{DispatchError, DispatchResult};

/// Bot platform callback payload limit, in bytes.
pub const CALLBACK_DATA_MAX: usize = 64;

/// Stored-token TTL: 36 h, inside the 24–48 h contract.
const TOKEN_TTL_SECS: u64 = 36 * 3600;

const KEY_PREFIX: &str = "cbtoken:";

fn new_token() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    format!("cb:{}", hex::encode(bytes))
}

/// Stores `payload` and returns a short token when it exceeds the cap;
/// short payloads come back unchanged.
pub async fn shorten(
    redis: &mut ConnectionManager,
    payload: &str,
) -> DispatchResult<String> {
    if payload.len() <= CALLBACK_DATA_MAX {
        return Ok(payload.to_string());
    }
    let token = new_token();
    let key = format!("{KEY_PREFIX}{token}");
    redis
        .set_ex::<_, _, ()>(&key, payload, TOKEN_TTL_SECS)
        .await
        .map_err(|e| DispatchError::Internal(format!("redis set failed: {e}")))?;
    Ok(token)
}

/// Resolves inbound callback data: plain payloads pass through; `cb:`
/// tokens are looked up and `None` means the button expired.
pub async fn resolve(
    redis: &mut ConnectionManager,
    data: &str,
) -> DispatchResult<Option<String>> {
    if !data.starts_with("cb:") {
        return Ok(Some(data.to_string()));
    }
    let key = format!("{KEY_PREFIX}{data}");
    let payload: Option<String> = redis
        .get(&key)
        .await
        .map_err(|e| DispatchError::Internal(format!("redis get failed: {e}")))?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape_fits_cap() {
        let token = new_token();
        assert!(token.len() <= CALLBACK_DATA_MAX);
        assert!(token.starts_with("cb:"));
    }
}
