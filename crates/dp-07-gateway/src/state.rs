//! Shared application state for the axum handlers.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use sqlx::PgPool;

use dp_05_conversation::ConversationEngine;

use crate::config::AppConfig;

/// State cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub redis: ConnectionManager,
    pub engine: Arc<ConversationEngine>,
    pub config: Arc<AppConfig>,
    /// Shared HTTP client for readiness probes.
    pub http: reqwest::Client,
}
