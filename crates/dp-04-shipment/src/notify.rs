//! Outbound notification bodies for shipment events.
//!
//! Texts are the HTML subset the bot platform accepts; user-entered values
//! are escaped here, at build time, so raw context never reaches markup.
//! The outbox workers convert to web-chat markdown at the adapter boundary.

use dp_01_validation::sanitize_for_html;
use shared_types::{format_money, Delivery, Keyboard, OutboundContent};

/// Outbox `message_type` values for shipment events.
pub mod message_type {
    pub const DELIVERY_CREATED: &str = "delivery_created";
    pub const DELIVERY_BROADCAST: &str = "delivery_broadcast";
    pub const CAPTURE_REQUESTED: &str = "capture_requested";
    pub const DELIVERY_CAPTURED: &str = "delivery_captured";
    pub const DELIVERY_PICKED_UP: &str = "delivery_picked_up";
    pub const DELIVERY_DELIVERED: &str = "delivery_delivered";
    pub const DELIVERY_CANCELLED: &str = "delivery_cancelled";
}

fn route_line(delivery: &Delivery) -> String {
    format!(
        "מ: {}\nאל: {}",
        sanitize_for_html(&delivery.pickup_address),
        sanitize_for_html(&delivery.dropoff_address)
    )
}

/// Confirmation to the sender right after creation.
pub fn created_for_sender(delivery: &Delivery) -> OutboundContent {
    OutboundContent {
        text: format!(
            "<b>המשלוח נוצר!</b>\n{}\nמחיר: {} ₪\nנעדכן ברגע ששליח יתפוס אותו.",
            route_line(delivery),
            format_money(delivery.fee)
        ),
        keyboard: None,
        media: None,
    }
}

/// Broadcast to all eligible couriers for a new OPEN shipment. Carries the
/// capture token in the button payload, never the delivery id.
pub fn broadcast_to_couriers(delivery: &Delivery) -> OutboundContent {
    OutboundContent {
        text: format!(
            "<b>משלוח חדש!</b>\n{}\nתשלום: {} ₪",
            route_line(delivery),
            format_money(delivery.fee)
        ),
        keyboard: Some(Keyboard {
            rows: vec![vec![format!("capture:{}", delivery.token)]],
        }),
        media: None,
    }
}

/// To the sender once a courier captured the shipment.
pub fn captured_for_sender(delivery: &Delivery, courier_name: &str) -> OutboundContent {
    OutboundContent {
        text: format!(
            "<b>המשלוח נתפס!</b>\nהשליח {} בדרך לאיסוף.\n{}",
            sanitize_for_html(courier_name),
            route_line(delivery)
        ),
        keyboard: None,
        media: None,
    }
}

/// To the requesting courier when a dispatcher approves the capture.
pub fn approved_for_courier(delivery: &Delivery) -> OutboundContent {
    OutboundContent {
        text: format!(
            "<b>הבקשה אושרה!</b>\nהמשלוח שלך:\n{}\nתשלום: {} ₪",
            route_line(delivery),
            format_money(delivery.fee)
        ),
        keyboard: None,
        media: None,
    }
}

/// To the requesting courier when a dispatcher rejects the capture.
pub fn rejected_for_courier() -> OutboundContent {
    OutboundContent {
        text: "הבקשה לתפיסת המשלוח נדחתה.".to_string(),
        keyboard: None,
        media: None,
    }
}

/// To a station group when a courier requests a two-step capture.
pub fn capture_requested_for_station(delivery: &Delivery, courier_name: &str) -> OutboundContent {
    OutboundContent {
        text: format!(
            "<b>בקשת תפיסה</b>\nהשליח {} מבקש לתפוס:\n{}",
            sanitize_for_html(courier_name),
            route_line(delivery)
        ),
        keyboard: Some(Keyboard {
            rows: vec![vec![
                format!("approve:{}", delivery.token),
                format!("reject:{}", delivery.token),
            ]],
        }),
        media: None,
    }
}

pub fn picked_up_for_sender(delivery: &Delivery) -> OutboundContent {
    OutboundContent {
        text: format!("<b>המשלוח נאסף</b> ובדרכו ליעד.\n{}", route_line(delivery)),
        keyboard: None,
        media: None,
    }
}

pub fn delivered_for_sender(delivery: &Delivery) -> OutboundContent {
    OutboundContent {
        text: format!("<b>המשלוח נמסר!</b>\n{}", route_line(delivery)),
        keyboard: None,
        media: None,
    }
}

pub fn cancelled_for_courier(delivery: &Delivery) -> OutboundContent {
    OutboundContent {
        text: format!("המשלוח בוטל.\n{}", route_line(delivery)),
        keyboard: None,
        media: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use shared_types::DeliveryStatus;

    fn delivery() -> Delivery {
        Delivery {
            id: 7,
            token: "abc123".into(),
            sender_id: 1,
            courier_id: None,
            station_id: None,
            requesting_courier_id: None,
            pickup_address: "רחוב הרצל 5".into(),
            pickup_lat: None,
            pickup_lng: None,
            pickup_contact_name: None,
            pickup_contact_phone: None,
            dropoff_address: "<b>יעד</b>".into(),
            dropoff_lat: None,
            dropoff_lng: None,
            dropoff_contact_name: None,
            dropoff_contact_phone: None,
            status: DeliveryStatus::Open,
            fee: dec!(25),
            notes: None,
            created_at: Utc::now(),
            captured_at: None,
            delivered_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn test_user_text_is_escaped() {
        let content = created_for_sender(&delivery());
        assert!(content.text.contains("&lt;b&gt;יעד&lt;/b&gt;"));
        assert!(content.text.contains("25.00"));
    }

    #[test]
    fn test_broadcast_uses_token_not_id() {
        let content = broadcast_to_couriers(&delivery());
        let kb = content.keyboard.unwrap();
        assert_eq!(kb.rows[0][0], "capture:abc123");
        assert!(!content.text.contains('7'));
    }

    #[test]
    fn test_courier_name_is_escaped() {
        let content = captured_for_sender(&delivery(), "<script>x</script>");
        assert!(!content.text.contains("<script>"));
    }
}
