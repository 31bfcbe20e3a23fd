//! # Conversation Engine
//!
//! A per-(user, platform) state machine with validated transitions, typed
//! per-flow context, and role-based routing.
//!
//! ## Architecture
//!
//! ```text
//! inbound text/callback
//!        │
//!        ▼
//!   ┌─────────┐   global keyword?   ┌──────────────┐
//!   │ engine  │ ──(guarded)──────► │ role router  │
//!   └────┬────┘                     └──────┬───────┘
//!        │ dispatch by role                │ explicit per-role menu
//!        ▼                                 ▼
//!   handlers::{sender, courier, dispatcher, station}
//!        │ (reply, new_state, context_patch, keyboard)
//!        ▼
//!   transition validation ► copy-on-write context merge ► session save
//! ```
//!
//! Handlers are pure with respect to the store: they reach business state
//! only through the `ConversationServices` port, which makes every flow
//! testable against an in-memory implementation.

pub mod adapters;
pub mod domain;
pub mod engine;
pub mod handlers;
pub mod keyboards;
pub mod ports;
pub mod router;
pub mod texts;

pub use domain::graph::transition_allowed;
pub use domain::reply::HandlerReply;
pub use domain::state;
pub use engine::ConversationEngine;
pub use ports::{ClaimByToken, ConversationServices, SessionStore};
