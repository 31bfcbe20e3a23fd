//! # Wallet Engine
//!
//! Courier and station wallets with an append-only ledger.
//!
//! ## Invariants
//!
//! 1. After any committed transaction, every wallet satisfies
//!    `balance ≥ credit_limit`.
//! 2. At most one ledger row exists per (courier_id, delivery_id,
//!    entry_type); a violation rolls the whole transaction back as a
//!    duplicate charge.
//! 3. Every ledger row's `balance_after` equals the wallet balance
//!    immediately after that row's transaction.
//!
//! All read-modify-write sequences acquire the wallet row `FOR UPDATE`
//! inside the same transaction as the writes; a committed balance is never
//! patched afterwards.

pub mod domain;
pub mod engine;

pub use domain::compute_debit;
pub use engine::WalletService;
