//! The handler contract: every role handler returns a reply text, the next
//! state, a context patch, and an optional keyboard. Handlers never write
//! the session themselves; the engine validates the transition and persists.

use serde_json::{Map, Value};
use shared_types::Keyboard;

/// What a role handler produces for one inbound message.
#[derive(Debug, Clone)]
pub struct HandlerReply {
    /// HTML-subset reply text; user-entered content must already be escaped.
    pub text: String,
    /// Next state; equal to the current state to stay and re-prompt.
    pub new_state: String,
    /// Context patch merged copy-on-write (`null` values delete keys).
    pub context_patch: Map<String, Value>,
    pub keyboard: Option<Keyboard>,
    /// Replace the context with the patch instead of merging (flow
    /// completion and `/start`).
    pub clear_context: bool,
}

impl HandlerReply {
    /// A reply that stays in the current state.
    pub fn stay(state: &str, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            new_state: state.to_string(),
            context_patch: Map::new(),
            keyboard: None,
            clear_context: false,
        }
    }

    /// A reply that moves to `new_state`.
    pub fn go(new_state: &str, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            new_state: new_state.to_string(),
            context_patch: Map::new(),
            keyboard: None,
            clear_context: false,
        }
    }

    pub fn with_patch(mut self, patch: Map<String, Value>) -> Self {
        self.context_patch = patch;
        self
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn clearing_context(mut self) -> Self {
        self.clear_context = true;
        self
    }
}
