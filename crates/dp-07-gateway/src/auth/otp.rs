//! OTP issuance and verification.

use rand::rngs::OsRng;
use rand::RngCore;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use shared_types::{DispatchError, DispatchResult, UserId};
use subtle::ConstantTimeEq;
use tracing::info;

use dp_01_validation::mask_phone;

/// Minimum spacing between OTP requests per phone.
const OTP_REQUEST_SPACING_SECS: u64 = 60;

fn otp_key(user_id: UserId) -> String {
    format!("panel_otp:{user_id}")
}

fn rate_key(phone: &str) -> String {
    format!("rate:otp:{phone}")
}

fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Generates a 6-digit code from the OS CSPRNG. Rejection sampling keeps
/// the distribution uniform over 000000–999999.
fn generate_code() -> String {
    loop {
        let raw = OsRng.next_u32();
        if raw < 4_000_000_000 {
            return format!("{:06}", raw % 1_000_000);
        }
    }
}

/// Issues a fresh OTP for the user, enforcing the 60 s per-phone spacing.
/// Only the hash is stored; the plaintext code goes to the outbound
/// channel once and is returned for enqueueing.
pub async fn request_otp(
    redis: &mut ConnectionManager,
    user_id: UserId,
    phone: &str,
    ttl_seconds: u64,
) -> DispatchResult<String> {
    // SET NX EX marks the rate window atomically.
    let fresh: bool = redis::cmd("SET")
        .arg(rate_key(phone))
        .arg(1)
        .arg("NX")
        .arg("EX")
        .arg(OTP_REQUEST_SPACING_SECS)
        .query_async::<Option<String>>(redis)
        .await
        .map_err(|e| DispatchError::Internal(format!("redis: {e}")))?
        .is_some();
    if !fresh {
        return Err(DispatchError::RateLimited {
            retry_after_secs: OTP_REQUEST_SPACING_SECS,
        });
    }

    let code = generate_code();
    redis
        .set_ex::<_, _, ()>(otp_key(user_id), hash_code(&code), ttl_seconds)
        .await
        .map_err(|e| DispatchError::Internal(format!("redis: {e}")))?;

    info!(user_id, phone = %mask_phone(phone), "OTP issued");
    Ok(code)
}

/// Verifies an OTP. The stored hash is consumed atomically (GETDEL), so a
/// second verify with the same code always fails.
pub async fn verify_otp(
    redis: &mut ConnectionManager,
    user_id: UserId,
    code: &str,
) -> DispatchResult<()> {
    let stored: Option<String> = redis::cmd("GETDEL")
        .arg(otp_key(user_id))
        .query_async(redis)
        .await
        .map_err(|e| DispatchError::Internal(format!("redis: {e}")))?;

    let stored = stored.ok_or(DispatchError::WrongOtp)?;
    let provided = hash_code(code);
    if provided.as_bytes().ct_eq(stored.as_bytes()).into() {
        info!(user_id, "OTP verified");
        Ok(())
    } else {
        Err(DispatchError::WrongOtp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_shape() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_code("123456"), hash_code("123456"));
        assert_ne!(hash_code("123456"), hash_code("123457"));
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(otp_key(7), "panel_otp:7");
        assert_eq!(rate_key("+972501234567"), "rate:otp:+972501234567");
    }
}
