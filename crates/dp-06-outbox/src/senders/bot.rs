//! Bot-API sender: `sendMessage` / `sendPhoto` / `sendDocument` with the
//! HTML parse mode and inline keyboards. Reply keyboards from handlers are
//! converted to inline-button rows; callback payloads over the 64-byte cap
//! are shortened through the Redis callback store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde_json::{json, Value};
use shared_types::{Keyboard, OutboundContent};
use tokio::sync::Mutex;
use tracing::debug;

use dispatch_telemetry::{current_correlation_id, CORRELATION_HEADER};

use crate::callback_store;
use crate::senders::{PlatformSender, SendError};

/// HTTP adapter for the bot platform.
pub struct BotSender {
    client: reqwest::Client,
    base_url: String,
    /// Redis handle for callback-token indirection; None disables
    /// shortening (long payloads are then truncated by the platform).
    redis: Option<Mutex<ConnectionManager>>,
}

impl BotSender {
    /// `base_url` already carries the bot token
    /// (e.g. `https://api.telegram.org/bot<TOKEN>`).
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        redis: Option<ConnectionManager>,
    ) -> Self {
        Self {
            client,
            base_url,
            redis: redis.map(Mutex::new),
        }
    }

    async fn keyboard_markup(&self, keyboard: &Keyboard) -> Result<Value, SendError> {
        let mut rows: Vec<Vec<Value>> = Vec::new();
        for row in &keyboard.rows {
            let mut buttons = Vec::new();
            for label in row {
                let callback = match &self.redis {
                    Some(redis) => {
                        let mut conn = redis.lock().await;
                        callback_store::shorten(&mut conn, label)
                            .await
                            .map_err(|e| SendError::Transient(e.to_string()))?
                    }
                    None => label.clone(),
                };
                buttons.push(json!({ "text": button_text(label), "callback_data": callback }));
            }
            rows.push(buttons);
        }
        Ok(json!({ "inline_keyboard": rows }))
    }

    async fn call(&self, method: &str, body: Value) -> Result<(), SendError> {
        let url = format!("{}/{}", self.base_url, method);
        let mut request = self.client.post(&url).json(&body);
        if let Some(correlation_id) = current_correlation_id() {
            request = request.header(CORRELATION_HEADER, correlation_id.to_string());
        }
        let response = request.send().await.map_err(SendError::from_reqwest)?;
        let status = response.status();
        if status.is_success() {
            debug!(method, "bot API call succeeded");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SendError::from_status(status.as_u16(), body))
    }
}

/// Action payloads (`capture:<token>` etc.) are machine labels; the button
/// the user sees gets the localized verb while the payload stays in
/// `callback_data`.
fn button_text(label: &str) -> String {
    let verb = label.split(':').next().unwrap_or(label);
    match verb {
        "capture" if label.len() > verb.len() => "לתפיסה".to_string(),
        "approve" if label.len() > verb.len() => "אישור".to_string(),
        "reject" if label.len() > verb.len() => "דחייה".to_string(),
        "pickup" if label.len() > verb.len() => "נאסף".to_string(),
        "deliver" if label.len() > verb.len() => "נמסר".to_string(),
        _ => label.to_string(),
    }
}

#[async_trait]
impl PlatformSender for BotSender {
    fn service_name(&self) -> &str {
        "bot-api"
    }

    async fn send(&self, recipient: &str, content: &OutboundContent) -> Result<(), SendError> {
        if let Some(media) = &content.media {
            let (method, field) = match media.kind.as_str() {
                "document" => ("sendDocument", "document"),
                _ => ("sendPhoto", "photo"),
            };
            let mut body = json!({
                "chat_id": recipient,
                field: media.url,
                "parse_mode": "HTML",
            });
            if let Some(caption) = &media.caption {
                body["caption"] = json!(caption);
            }
            return self.call(method, body).await;
        }

        let mut body = json!({
            "chat_id": recipient,
            "text": content.text,
            "parse_mode": "HTML",
        });
        if let Some(keyboard) = &content.keyboard {
            if !keyboard.is_empty() {
                body["reply_markup"] = self.keyboard_markup(keyboard).await?;
            }
        }
        self.call("sendMessage", body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_payloads_get_localized_button_text() {
        assert_eq!(button_text("capture:abc123"), "לתפיסה");
        assert_eq!(button_text("approve:abc123"), "אישור");
        assert_eq!(button_text("reject:abc123"), "דחייה");
    }

    #[test]
    fn test_plain_labels_pass_through() {
        assert_eq!(button_text("ארנק"), "ארנק");
        assert_eq!(button_text("capture"), "capture");
    }
}
