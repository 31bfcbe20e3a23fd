//! Panel authentication: OTP over the outbound channel, JWT access tokens,
//! rotating single-use refresh tokens.
//!
//! Redis layout:
//! - `panel_otp:<user_id>` — SHA-256 of the one-time code, TTL 300 s,
//!   deleted on verify (one-time use).
//! - `refresh_token:<jti>` — user id, ~14-day TTL, consumed by GETDEL on
//!   rotation (single use).
//! - `rate:otp:<phone>` — 60 s spacing marker for OTP requests.

pub mod jwt;
pub mod otp;

pub use jwt::{issue_token_pair, rotate_refresh, Claims, TokenPair};
pub use otp::{request_otp, verify_otp};
