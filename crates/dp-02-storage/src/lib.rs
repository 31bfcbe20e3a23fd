//! # Storage Layer
//!
//! Postgres access for Dispatch-Platform: connection pool, schema bootstrap,
//! and per-aggregate repositories.
//!
//! ## Conventions
//!
//! - Every repository function takes `&mut PgConnection`, so callers decide
//!   the transaction boundary. Multi-step financial operations run inside a
//!   single transaction with `FOR UPDATE` row locks acquired up front.
//! - Queries are explicit SQL; relationships are loaded eagerly by dedicated
//!   helpers, never implicitly.
//! - Rows map to `shared-types` entities through explicit `from_row`
//!   functions in each repository.

pub mod deliveries;
pub mod error;
pub mod outbox;
pub mod pool;
pub mod sessions;
pub mod stations;
pub mod users;
pub mod wallets;
pub mod webhook_events;

pub use error::{db_err, is_unique_violation};
pub use pool::{connect, init_schema};

/// The DDL shipped with this crate; applied by `init_schema`.
pub const SCHEMA_SQL: &str = include_str!("../schema.sql");
