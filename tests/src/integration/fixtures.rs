//! Shared fixtures for the integration suites.

use chrono::Utc;
use shared_types::{ApprovalStatus, Platform, Role, Station, User};

pub fn user(id: i64, role: Role) -> User {
    User {
        id,
        phone: format!("tg:{id}"),
        chat_id: id.to_string(),
        display_name: String::new(),
        role,
        platform: Platform::Bot,
        is_active: true,
        approval_status: None,
        full_name: None,
        id_document_ref: None,
        selfie_ref: None,
        vehicle_photo_ref: None,
        vehicle_category: None,
        service_area: None,
        terms_accepted_at: None,
        created_at: Utc::now(),
    }
}

pub fn approved_courier(id: i64) -> User {
    User {
        display_name: "שליח".to_string(),
        approval_status: Some(ApprovalStatus::Approved),
        ..user(id, Role::Courier)
    }
}

pub fn station(id: i64, name: &str) -> Station {
    Station {
        id,
        name: name.to_string(),
        group_chat_id: Some(format!("-100{id}")),
        is_active: true,
        created_at: Utc::now(),
    }
}
