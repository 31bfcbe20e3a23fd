//! Postgres-backed session store.

use async_trait::async_trait;
use serde_json::{Map, Value};
use shared_types::{ConversationSession, DispatchResult, Platform, UserId};
use sqlx::PgPool;

use dp_02_storage::{db_err, sessions};

use crate::ports::SessionStore;

/// Production session store over the conversation_sessions table.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get_or_create(
        &self,
        user_id: UserId,
        platform: Platform,
    ) -> DispatchResult<ConversationSession> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        sessions::get_or_create_session(&mut conn, user_id, platform).await
    }

    async fn save(
        &self,
        user_id: UserId,
        platform: Platform,
        state: &str,
        context: &Map<String, Value>,
    ) -> DispatchResult<()> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        sessions::save_session(&mut conn, user_id, platform, state, context).await
    }

    async fn reset(&self, user_id: UserId, platform: Platform) -> DispatchResult<()> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        sessions::reset_session(&mut conn, user_id, platform).await
    }
}
