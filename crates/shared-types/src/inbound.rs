//! # Normalized Inbound Messages
//!
//! Platform adapters feed the core a normalized tuple regardless of the wire
//! shape. Authorization decisions always use `from_user_id` (who pressed),
//! never the chat id (where it was pressed).

use serde::{Deserialize, Serialize};

use crate::entities::{MediaRef, Platform};

/// A platform-agnostic inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub platform: Platform,
    /// Where to reply: bot chat id or web-chat contact id.
    pub chat_id: String,
    /// Who acted. For bot updates this is `from.id`, which differs from the
    /// chat id in groups.
    pub from_user_id: String,
    /// Platform-stable message id used for idempotency.
    pub message_id: String,
    pub text: Option<String>,
    /// Raw callback payload for button presses (bot platform, ≤64 bytes).
    pub callback_data: Option<String>,
    pub media: Option<MediaRef>,
    /// Display name as exposed by the platform, if any.
    pub display_name: Option<String>,
    /// Phone as exposed by the platform, if any (web-chat only).
    pub phone: Option<String>,
    /// Set by the adapter boundary once the source signature was verified.
    /// The core refuses to process messages without it.
    pub verified: bool,
}

impl InboundMessage {
    /// The effective text input for the conversation engine: callback data
    /// wins over typed text.
    pub fn input(&self) -> Option<&str> {
        self.callback_data.as_deref().or(self.text.as_deref())
    }

    /// Idempotency key scoped by platform so the two webhook sources can
    /// never collide.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.platform.as_str(), self.message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg() -> InboundMessage {
        InboundMessage {
            platform: Platform::Bot,
            chat_id: "42".into(),
            from_user_id: "42".into(),
            message_id: "m-1".into(),
            text: Some("hello".into()),
            callback_data: None,
            media: None,
            display_name: None,
            phone: None,
            verified: true,
        }
    }

    #[test]
    fn test_input_prefers_callback_data() {
        let mut m = msg();
        assert_eq!(m.input(), Some("hello"));
        m.callback_data = Some("menu:wallet".into());
        assert_eq!(m.input(), Some("menu:wallet"));
    }

    #[test]
    fn test_dedup_key_is_platform_scoped() {
        let bot = msg();
        let mut web = msg();
        web.platform = Platform::WebChat;
        assert_ne!(bot.dedup_key(), web.dedup_key());
        assert_eq!(bot.dedup_key(), "bot:m-1");
    }
}
