//! Platform senders: the HTTP adapters that deliver outbox content to the
//! bot API and the web-chat gateway.

pub mod bot;
pub mod webchat;

pub use bot::BotSender;
pub use webchat::WebChatSender;

use async_trait::async_trait;
use shared_types::OutboundContent;

/// Send failure classification driving retry behavior: transient failures
/// (HTTP 429/5xx, timeouts, connection errors) are retried with backoff;
/// permanent failures (other 4xx, malformed requests) dead-letter the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    Transient(String),
    Permanent(String),
}

impl SendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SendError::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            SendError::Transient(m) | SendError::Permanent(m) => m,
        }
    }

    /// Classifies an HTTP status per the retry contract.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 || status >= 500 {
            SendError::Transient(format!("HTTP {status}: {body}"))
        } else {
            SendError::Permanent(format!("HTTP {status}: {body}"))
        }
    }

    /// Classifies a reqwest transport error (timeouts and connection
    /// failures are transient).
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            SendError::Transient(e.to_string())
        } else {
            SendError::Permanent(e.to_string())
        }
    }
}

/// A platform delivery adapter. One breaker guards each adapter, keyed by
/// `service_name`.
#[async_trait]
pub trait PlatformSender: Send + Sync {
    fn service_name(&self) -> &str;

    async fn send(&self, recipient: &str, content: &OutboundContent) -> Result<(), SendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(SendError::from_status(429, String::new()).is_transient());
        assert!(SendError::from_status(502, String::new()).is_transient());
        assert!(SendError::from_status(503, String::new()).is_transient());
        assert!(SendError::from_status(504, String::new()).is_transient());
        assert!(SendError::from_status(500, String::new()).is_transient());
        assert!(!SendError::from_status(400, String::new()).is_transient());
        assert!(!SendError::from_status(403, String::new()).is_transient());
        assert!(!SendError::from_status(404, String::new()).is_transient());
    }
}
