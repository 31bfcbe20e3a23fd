//! # HTTP Gateway
//!
//! The inbound surface of Dispatch-Platform:
//!
//! - **Webhook intake** for the two chat platforms, with idempotency,
//!   user upsert, and role-based dispatch into the conversation engine.
//! - **Panel auth**: OTP issuance over the outbound channel, JWT access
//!   tokens with rotating single-use refresh tokens.
//! - **Health**: cheap liveness plus a readiness probe of every
//!   dependency with sanitized diagnostics.
//! - **Admin debug surface** behind the shared admin key: breakers,
//!   outbox inspection and retry, session state and force-state.

pub mod auth;
pub mod config;
pub mod error;
pub mod intake;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod wire;

pub use config::AppConfig;
pub use routes::build_router;
pub use state::AppState;
