//! Correlation ID for request tracking.
//!
//! Uses UUID v7 for time-ordered, unique identifiers. The current ID lives
//! in a tokio task-local; crossing a `tokio::spawn` boundary requires an
//! explicit `correlation_scope` with a cloned ID, which keeps propagation
//! visible at every spawn site.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use uuid::Uuid;

/// HTTP header carrying the correlation ID on inbound and outbound calls.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Correlation ID for tracking one logical operation through webhook intake,
/// conversation handling, outbox workers, and outbound HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new correlation ID (UUID v7, time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse from string (e.g. an incoming header).
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

tokio::task_local! {
    static CURRENT: CorrelationId;
}

/// Runs `fut` with `id` as the ambient correlation ID.
///
/// Worker tasks and spawned continuations must re-enter a scope with a
/// cloned ID; task-locals do not cross `tokio::spawn`.
pub async fn correlation_scope<F, T>(id: CorrelationId, fut: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT.scope(id, fut).await
}

/// The ambient correlation ID, if inside a `correlation_scope`.
pub fn current_correlation_id() -> Option<CorrelationId> {
    CURRENT.try_with(|id| *id).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_correlation_id_unique() {
        let id1 = CorrelationId::new();
        let id2 = CorrelationId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_parse_round_trip() {
        let id = CorrelationId::new();
        let parsed = CorrelationId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CorrelationId::parse("not-a-uuid").is_err());
    }

    #[tokio::test]
    async fn test_scope_provides_ambient_id() {
        assert!(current_correlation_id().is_none());
        let id = CorrelationId::new();
        let seen = correlation_scope(id, async { current_correlation_id() }).await;
        assert_eq!(seen, Some(id));
        assert!(current_correlation_id().is_none());
    }

    #[tokio::test]
    async fn test_scope_does_not_cross_spawn() {
        let id = CorrelationId::new();
        let handle = correlation_scope(id, async {
            tokio::spawn(async { current_correlation_id() })
        })
        .await;
        assert_eq!(handle.await.unwrap(), None);
    }

    #[test]
    fn test_serialization_is_transparent() {
        let id = CorrelationId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
