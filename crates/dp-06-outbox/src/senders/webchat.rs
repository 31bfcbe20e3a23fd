//! Web-chat gateway sender: `POST /send` and `POST /send-media`.
//!
//! Texts are converted from the HTML subset to web-chat markup at this
//! boundary. Keyboards are rendered as enumerated plain-text options by
//! default; the gateway's interactive list messages are known to silently
//! drop messages for some identifier forms, so interactive mode sits
//! behind an explicit flag.

use async_trait::async_trait;
use serde_json::json;
use shared_types::{Keyboard, OutboundContent};
use tracing::debug;

use dispatch_telemetry::{current_correlation_id, CORRELATION_HEADER};

use crate::markup::html_to_webchat;
use crate::senders::{PlatformSender, SendError};

/// HTTP adapter for the web-chat gateway.
pub struct WebChatSender {
    client: reqwest::Client,
    base_url: String,
    service: String,
    interactive: bool,
}

impl WebChatSender {
    /// `service` distinguishes the user channel from the admin channel so
    /// each gets its own circuit breaker.
    pub fn new(client: reqwest::Client, base_url: String, service: String, interactive: bool) -> Self {
        Self {
            client,
            base_url,
            service,
            interactive,
        }
    }

    fn render_options(text: &str, keyboard: &Keyboard) -> String {
        let mut out = text.to_string();
        let labels: Vec<&String> = keyboard.rows.iter().flatten().collect();
        if !labels.is_empty() {
            out.push('\n');
            for (i, label) in labels.iter().enumerate() {
                out.push_str(&format!("\n{}. {}", i + 1, label));
            }
        }
        out
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), SendError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(&body);
        if let Some(correlation_id) = current_correlation_id() {
            request = request.header(CORRELATION_HEADER, correlation_id.to_string());
        }
        let response = request.send().await.map_err(SendError::from_reqwest)?;
        let status = response.status();
        if status.is_success() {
            debug!(path, service = %self.service, "web-chat call succeeded");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SendError::from_status(status.as_u16(), body))
    }
}

#[async_trait]
impl PlatformSender for WebChatSender {
    fn service_name(&self) -> &str {
        &self.service
    }

    async fn send(&self, recipient: &str, content: &OutboundContent) -> Result<(), SendError> {
        if let Some(media) = &content.media {
            let body = json!({
                "phone": recipient,
                "media_url": media.url,
                "media_type": media.kind,
                "caption": media.caption.as_deref().map(html_to_webchat),
            });
            return self.post("/send-media", body).await;
        }

        let text = html_to_webchat(&content.text);
        let body = match &content.keyboard {
            Some(keyboard) if !keyboard.is_empty() => {
                if self.interactive {
                    let labels: Vec<&String> = keyboard.rows.iter().flatten().collect();
                    json!({ "phone": recipient, "message": text, "keyboard": labels })
                } else {
                    json!({ "phone": recipient, "message": Self::render_options(&text, keyboard) })
                }
            }
            _ => json!({ "phone": recipient, "message": text }),
        };
        self.post("/send", body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_are_enumerated() {
        let keyboard = Keyboard::single_column(&["תפיסה", "דילוג"]);
        let rendered = WebChatSender::render_options("בחרו:", &keyboard);
        assert!(rendered.contains("1. תפיסה"));
        assert!(rendered.contains("2. דילוג"));
    }
}
