//! Per-role conversation handlers.
//!
//! Each handler is pure with respect to the store: it reads the current
//! state and context, calls business services through the port, and returns
//! a `HandlerReply`. The engine owns transition validation and persistence.

pub mod courier;
pub mod dispatcher;
pub mod sender;
pub mod station;

use shared_types::{format_money, Delivery};

use dp_01_validation::sanitize_for_html;

/// One-line delivery summary used across menus.
pub(crate) fn delivery_line(delivery: &Delivery) -> String {
    format!(
        "{} ← {} | {} ₪ | {}",
        sanitize_for_html(&delivery.pickup_address),
        sanitize_for_html(&delivery.dropoff_address),
        format_money(delivery.fee),
        delivery.status.as_str()
    )
}

/// Formats a list of deliveries, or a placeholder when empty.
pub(crate) fn delivery_list(deliveries: &[Delivery], empty_text: &str) -> String {
    if deliveries.is_empty() {
        return empty_text.to_string();
    }
    deliveries
        .iter()
        .map(delivery_line)
        .collect::<Vec<_>>()
        .join("\n")
}
