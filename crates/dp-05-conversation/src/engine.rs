//! The conversation engine: session load, keyword guard, role dispatch,
//! transition validation, copy-on-write context persistence.

use std::sync::Arc;

use serde_json::Map;
use shared_types::{
    ConversationSession, DispatchError, DispatchResult, MediaRef, Platform, User, UserId,
};
use tracing::{info, warn};

use crate::domain::context::merge_context;
use crate::domain::graph::transition_allowed;
use crate::domain::reply::HandlerReply;
use crate::domain::state::{is_in_multi_step_flow, INITIAL};
use crate::ports::{ConversationServices, SessionStore};
use crate::router;
use crate::texts;

/// Drives one conversation per (user, platform).
pub struct ConversationEngine {
    store: Arc<dyn SessionStore>,
    services: Arc<dyn ConversationServices>,
}

impl ConversationEngine {
    pub fn new(store: Arc<dyn SessionStore>, services: Arc<dyn ConversationServices>) -> Self {
        Self { store, services }
    }

    /// Handles one inbound message and returns the reply to enqueue.
    pub async fn handle_message(
        &self,
        user: &User,
        input: &str,
        media: Option<&MediaRef>,
    ) -> DispatchResult<HandlerReply> {
        let session = self
            .store
            .get_or_create(user.id, user.platform)
            .await?;
        let state = session.current_state.clone();
        let trimmed = input.trim();

        // `/start` always resets: context is wiped, the user lands on the
        // role menu.
        if trimmed == "/start" {
            self.store.reset(user.id, user.platform).await?;
            let reply = router::route_to_role_menu(user, &*self.services).await?;
            self.store
                .save(user.id, user.platform, &reply.new_state, &reply.context_patch)
                .await?;
            return Ok(reply);
        }

        // Join keywords enroll a sender into courier onboarding. Guarded
        // like every other keyword so an address containing the word does
        // not re-enroll anyone.
        if !is_in_multi_step_flow(&state)
            && user.role == shared_types::Role::Sender
            && is_join_keyword(trimmed)
        {
            self.services
                .set_role(user.id, shared_types::Role::Courier)
                .await?;
            let reply = crate::handlers::courier::entry_reply(user);
            self.store
                .save(user.id, user.platform, &reply.new_state, &reply.context_patch)
                .await?;
            return Ok(reply);
        }

        // Global keywords route to the role menu, but only outside
        // multi-step flows so free text (an address, a name) can never
        // trigger navigation.
        if !is_in_multi_step_flow(&state) && is_global_keyword(trimmed) {
            let reply = router::route_to_role_menu(user, &*self.services).await?;
            self.store
                .save(user.id, user.platform, &reply.new_state, &reply.context_patch)
                .await?;
            return Ok(reply);
        }

        let reply = router::dispatch(
            user,
            &state,
            &session.context_data,
            trimmed,
            media,
            &*self.services,
        )
        .await?;

        self.persist_transition(user.id, user.platform, &session, reply)
            .await
    }

    /// Validates the handler's transition and persists state + context.
    async fn persist_transition(
        &self,
        user_id: UserId,
        platform: Platform,
        session: &ConversationSession,
        reply: HandlerReply,
    ) -> DispatchResult<HandlerReply> {
        let from = session.current_state.as_str();
        // Role-menu entries are reachable from anywhere; flows route
        // through INITIAL semantics on reset.
        if !transition_allowed(from, &reply.new_state)
            && !transition_allowed(INITIAL, &reply.new_state)
        {
            warn!(
                user_id,
                from = from,
                to = %reply.new_state,
                "handler produced an undeclared transition"
            );
            return Err(DispatchError::InvalidStateTransition {
                from: from.to_string(),
                to: reply.new_state.clone(),
            });
        }

        let new_context = if reply.clear_context {
            reply.context_patch.clone()
        } else {
            merge_context(&session.context_data, &reply.context_patch)
        };
        self.store
            .save(user_id, platform, &reply.new_state, &new_context)
            .await?;
        Ok(reply)
    }

    /// Validated programmatic transition (used by operator tooling when a
    /// flow must advance without an inbound message).
    pub async fn transition_to(
        &self,
        user_id: UserId,
        platform: Platform,
        new_state: &str,
        context_patch: Map<String, serde_json::Value>,
    ) -> DispatchResult<()> {
        let session = self.store.get_or_create(user_id, platform).await?;
        if !transition_allowed(&session.current_state, new_state) {
            return Err(DispatchError::InvalidStateTransition {
                from: session.current_state.clone(),
                to: new_state.to_string(),
            });
        }
        let merged = merge_context(&session.context_data, &context_patch);
        self.store.save(user_id, platform, new_state, &merged).await
    }

    /// Administrative reset: skips transition validation and may clear the
    /// context. Reserved for the debug surface.
    pub async fn force_state(
        &self,
        user_id: UserId,
        platform: Platform,
        new_state: &str,
        clear_context: bool,
    ) -> DispatchResult<()> {
        let session = self.store.get_or_create(user_id, platform).await?;
        let context = if clear_context {
            Map::new()
        } else {
            session.context_data.clone()
        };
        info!(user_id, new_state, clear_context, "state forced by operator");
        self.store.save(user_id, platform, new_state, &context).await
    }

    /// Current session snapshot for the debug surface.
    pub async fn session(
        &self,
        user_id: UserId,
        platform: Platform,
    ) -> DispatchResult<ConversationSession> {
        self.store.get_or_create(user_id, platform).await
    }
}

fn is_global_keyword(input: &str) -> bool {
    let lowered = input.to_lowercase();
    texts::KEYWORD_MENU
        .iter()
        .chain(texts::KEYWORD_BACK.iter())
        .chain(texts::KEYWORD_MARKETING.iter())
        .any(|k| *k == lowered)
}

fn is_join_keyword(input: &str) -> bool {
    texts::KEYWORD_JOIN.contains(&input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_keywords() {
        assert!(is_global_keyword("menu"));
        assert!(is_global_keyword("תפריט"));
        assert!(is_global_keyword("Menu"));
        assert!(is_global_keyword("חזרה"));
        assert!(!is_global_keyword("רחוב הרצל 5"));
        assert!(!is_global_keyword("hello"));
    }
}
