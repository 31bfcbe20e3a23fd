//! In-memory session store for flow tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use shared_types::{ConversationSession, DispatchResult, Platform, UserId};

use crate::domain::state::INITIAL;
use crate::ports::SessionStore;

/// Session store backed by a mutex-guarded map; behaviorally equivalent to
/// the Postgres adapter for single-process tests.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<(UserId, Platform), ConversationSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: the current state string, if a session exists.
    pub fn state_of(&self, user_id: UserId, platform: Platform) -> Option<String> {
        self.sessions
            .lock()
            .get(&(user_id, platform))
            .map(|s| s.current_state.clone())
    }

    /// Test helper: the current context map, if a session exists.
    pub fn context_of(
        &self,
        user_id: UserId,
        platform: Platform,
    ) -> Option<Map<String, Value>> {
        self.sessions
            .lock()
            .get(&(user_id, platform))
            .map(|s| s.context_data.clone())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_or_create(
        &self,
        user_id: UserId,
        platform: Platform,
    ) -> DispatchResult<ConversationSession> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .entry((user_id, platform))
            .or_insert_with(|| ConversationSession {
                user_id,
                platform,
                current_state: INITIAL.to_string(),
                context_data: Map::new(),
                updated_at: Utc::now(),
                last_activity_at: Utc::now(),
            });
        Ok(session.clone())
    }

    async fn save(
        &self,
        user_id: UserId,
        platform: Platform,
        state: &str,
        context: &Map<String, Value>,
    ) -> DispatchResult<()> {
        let mut sessions = self.sessions.lock();
        let now = Utc::now();
        sessions.insert(
            (user_id, platform),
            ConversationSession {
                user_id,
                platform,
                current_state: state.to_string(),
                context_data: context.clone(),
                updated_at: now,
                last_activity_at: now,
            },
        );
        Ok(())
    }

    async fn reset(&self, user_id: UserId, platform: Platform) -> DispatchResult<()> {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get_mut(&(user_id, platform)) {
            session.current_state = INITIAL.to_string();
            session.context_data = Map::new();
            session.updated_at = Utc::now();
        }
        Ok(())
    }
}
