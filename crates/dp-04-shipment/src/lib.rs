//! # Shipment Workflow
//!
//! Delivery lifecycle: create → (optional approval) → capture →
//! mark-picked-up → deliver, plus cancellation. Capture is a single
//! transaction that locks the delivery and the courier wallet, enforces the
//! credit limit and the station blacklist, appends the ledger row, credits
//! the station commission, and enqueues all notifications — so a failure at
//! any step discards every effect including the notifications.

pub mod notify;
pub mod service;
pub mod token;

pub use service::{CaptureKey, CaptureOutcome, NewShipmentRequest, ShipmentService};
pub use token::generate_token;
