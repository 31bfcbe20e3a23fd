//! # Outbox & Delivery Pipeline
//!
//! Drains the transactional outbox written by the business crates and
//! delivers messages to the chat platforms.
//!
//! ```text
//! ┌───────────────┐  10s tick   ┌─────────────────────────────────────┐
//! │ outbox table  │ ──────────► │ worker: claim batch (SKIP LOCKED)   │
//! │ (pending)     │             │   ├─ resolve recipients (broadcast) │
//! └───────────────┘             │   ├─ circuit breaker per service    │
//!                               │   ├─ platform sender (HTTP)         │
//!                               │   └─ sent / retry+backoff / failed  │
//!                               └─────────────────────────────────────┘
//! ```
//!
//! Per-recipient ordering is NOT guaranteed; consumers must tolerate
//! out-of-order notifications.

pub mod backoff;
pub mod breaker;
pub mod callback_store;
pub mod markup;
pub mod senders;
pub mod worker;

pub use backoff::next_backoff_secs;
pub use breaker::{breaker_for, breaker_stats, BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use senders::{BotSender, PlatformSender, SendError, WebChatSender};
pub use worker::{OutboxWorker, WorkerConfig};
