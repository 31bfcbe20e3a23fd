//! Wire formats of the two inbound webhook platforms, and their
//! normalization into `InboundMessage`.
//!
//! Authorization identity always comes from `from.id` (who pressed), never
//! `chat.id` (where): in group chats they differ.

use serde::Deserialize;
use shared_types::{InboundMessage, MediaRef, Platform};

// =============================================================================
// BOT-API PLATFORM
// =============================================================================

/// A bot-platform update: either a message or a callback query.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUpdate {
    #[serde(default)]
    pub update_id: Option<i64>,
    pub message: Option<BotMessage>,
    pub callback_query: Option<BotCallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotMessage {
    pub message_id: i64,
    pub from: Option<BotUser>,
    pub chat: BotChat,
    pub text: Option<String>,
    #[serde(default)]
    pub date: Option<i64>,
    #[serde(default)]
    pub photo: Option<Vec<BotPhotoSize>>,
    #[serde(default)]
    pub document: Option<BotDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl BotUser {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotPhotoSize {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotDocument {
    pub file_id: String,
}

/// Callback data is capped at 64 bytes by the platform; longer payloads
/// arrive as short tokens resolved through the callback store.
#[derive(Debug, Clone, Deserialize)]
pub struct BotCallbackQuery {
    pub id: String,
    pub from: BotUser,
    pub message: Option<BotMessage>,
    pub data: Option<String>,
}

impl BotUpdate {
    /// Normalizes the update, or None when it carries nothing actionable.
    pub fn normalize(&self, verified: bool) -> Option<InboundMessage> {
        if let Some(callback) = &self.callback_query {
            let chat_id = callback
                .message
                .as_ref()
                .map(|m| m.chat.id.to_string())
                .unwrap_or_else(|| callback.from.id.to_string());
            return Some(InboundMessage {
                platform: Platform::Bot,
                chat_id,
                from_user_id: callback.from.id.to_string(),
                message_id: format!("cbq-{}", callback.id),
                text: None,
                callback_data: callback.data.clone(),
                media: None,
                display_name: Some(callback.from.display_name()),
                phone: None,
                verified,
            });
        }

        let message = self.message.as_ref()?;
        let from = message.from.as_ref()?;
        let media = message
            .photo
            .as_ref()
            .and_then(|sizes| sizes.last())
            .map(|p| MediaRef {
                url: p.file_id.clone(),
                kind: "photo".to_string(),
                caption: None,
                mime_type: None,
            })
            .or_else(|| {
                message.document.as_ref().map(|d| MediaRef {
                    url: d.file_id.clone(),
                    kind: "document".to_string(),
                    caption: None,
                    mime_type: None,
                })
            });

        Some(InboundMessage {
            platform: Platform::Bot,
            chat_id: message.chat.id.to_string(),
            from_user_id: from.id.to_string(),
            message_id: message.message_id.to_string(),
            text: message.text.clone(),
            callback_data: None,
            media,
            display_name: Some(from.display_name()),
            phone: None,
            verified,
        })
    }
}

// =============================================================================
// WEB-CHAT GATEWAY
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WebChatPayload {
    #[serde(default)]
    pub messages: Vec<WebChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebChatMessage {
    pub sender_id: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    pub message_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub formatted_name: Option<String>,
}

impl WebChatMessage {
    pub fn normalize(&self, verified: bool) -> InboundMessage {
        let media = self.media_url.as_ref().map(|url| MediaRef {
            url: url.clone(),
            kind: self
                .media_type
                .clone()
                .unwrap_or_else(|| "photo".to_string()),
            caption: None,
            mime_type: self.mime_type.clone(),
        });
        // The sender id doubles as the phone when it is one; otherwise it
        // is an ecosystem-internal identifier we reply to verbatim.
        let phone = self
            .sender_id
            .split('@')
            .next()
            .filter(|p| p.chars().all(|c| c.is_ascii_digit()))
            .map(String::from);
        InboundMessage {
            platform: Platform::WebChat,
            chat_id: self.sender_id.clone(),
            from_user_id: self.sender_id.clone(),
            message_id: self.message_id.clone(),
            text: self.text.clone(),
            callback_data: None,
            media,
            display_name: self.formatted_name.clone(),
            phone,
            verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_message_normalization() {
        let update: BotUpdate = serde_json::from_str(
            r#"{"update_id":1,"message":{"message_id":10,"from":{"id":42,"first_name":"יוסי"},
                "chat":{"id":42},"text":"start","date":0}}"#,
        )
        .unwrap();
        let normalized = update.normalize(true).unwrap();
        assert_eq!(normalized.chat_id, "42");
        assert_eq!(normalized.from_user_id, "42");
        assert_eq!(normalized.message_id, "10");
        assert_eq!(normalized.text.as_deref(), Some("start"));
        assert!(normalized.verified);
    }

    #[test]
    fn test_callback_uses_presser_not_chat() {
        // Pressed inside a group: chat id differs from the presser.
        let update: BotUpdate = serde_json::from_str(
            r#"{"callback_query":{"id":"cb1","from":{"id":99},
                "message":{"message_id":5,"chat":{"id":-100123},"text":null},
                "data":"approve:tok"}}"#,
        )
        .unwrap();
        let normalized = update.normalize(true).unwrap();
        assert_eq!(normalized.from_user_id, "99");
        assert_eq!(normalized.chat_id, "-100123");
        assert_eq!(normalized.callback_data.as_deref(), Some("approve:tok"));
        assert_eq!(normalized.input(), Some("approve:tok"));
    }

    #[test]
    fn test_message_without_from_is_dropped() {
        let update: BotUpdate = serde_json::from_str(
            r#"{"message":{"message_id":5,"chat":{"id":1},"text":"x"}}"#,
        )
        .unwrap();
        assert!(update.normalize(true).is_none());
    }

    #[test]
    fn test_photo_picks_largest_size() {
        let update: BotUpdate = serde_json::from_str(
            r#"{"message":{"message_id":5,"from":{"id":1},"chat":{"id":1},
                "photo":[{"file_id":"small"},{"file_id":"large"}]}}"#,
        )
        .unwrap();
        let normalized = update.normalize(true).unwrap();
        assert_eq!(normalized.media.unwrap().url, "large");
    }

    #[test]
    fn test_webchat_phone_extraction() {
        let message = WebChatMessage {
            sender_id: "972501234567@c.us".to_string(),
            reply_to: None,
            message_id: "m-1".to_string(),
            text: Some("hi".to_string()),
            timestamp: None,
            media_url: None,
            media_type: None,
            mime_type: None,
            formatted_name: Some("יוסי".to_string()),
        };
        let normalized = message.normalize(true);
        assert_eq!(normalized.phone.as_deref(), Some("972501234567"));
        assert_eq!(normalized.chat_id, "972501234567@c.us");
    }

    #[test]
    fn test_webchat_internal_id_has_no_phone() {
        let message = WebChatMessage {
            sender_id: "abcdef123@lid".to_string(),
            reply_to: None,
            message_id: "m-2".to_string(),
            text: None,
            timestamp: None,
            media_url: None,
            media_type: None,
            mime_type: None,
            formatted_name: None,
        };
        assert!(message.normalize(true).phone.is_none());
    }
}
