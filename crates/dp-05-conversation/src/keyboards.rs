//! Menu keyboards and their button labels. Handlers match on these exact
//! labels, so they live next to the keyboards that render them.

use shared_types::Keyboard;

use crate::texts::{BTN_CANCEL, BTN_CONFIRM, BTN_SKIP, URGENCY_IMMEDIATE, URGENCY_SCHEDULED};

// --- Sender menu ---
pub const BTN_NEW_SHIPMENT: &str = "משלוח חדש";
pub const BTN_MY_SHIPMENTS: &str = "המשלוחים שלי";
pub const BTN_HELP: &str = "עזרה";

// --- Courier menu ---
pub const BTN_AVAILABLE: &str = "משלוחים זמינים";
pub const BTN_ACTIVE: &str = "המשלוחים הפעילים";
pub const BTN_WALLET: &str = "ארנק";
pub const BTN_CHANGE_AREA: &str = "שינוי אזור";
pub const BTN_HISTORY: &str = "היסטוריה";
pub const BTN_SUPPORT: &str = "תמיכה";
pub const BTN_DEPOSIT: &str = "הפקדה";

// --- Dispatcher additions ---
pub const BTN_ADD_SHIPMENT: &str = "הוספת משלוח";
pub const BTN_MANUAL_CHARGE: &str = "חיוב ידני";
pub const BTN_STATION_ACTIVE: &str = "משלוחי תחנה";
pub const BTN_STATION_HISTORY: &str = "היסטוריית תחנה";

// --- Station owner menu ---
pub const BTN_MANAGE_DISPATCHERS: &str = "ניהול סדרנים";
pub const BTN_MANAGE_OWNERS: &str = "ניהול בעלים";
pub const BTN_STATION_WALLET: &str = "ארנק תחנה";
pub const BTN_COLLECTION_REPORT: &str = "דוח גבייה";
pub const BTN_BLACKLIST: &str = "רשימה שחורה";
pub const BTN_GROUP_SETTINGS: &str = "הגדרות קבוצה";
pub const BTN_ADD: &str = "הוספה";
pub const BTN_REMOVE: &str = "הסרה";
pub const BTN_BACK: &str = "חזרה";
pub const BTN_SET_COMMISSION: &str = "עדכון עמלה";

// --- Vehicle categories ---
pub const VEHICLE_CATEGORIES: &[&str] = &["אופנוע", "רכב", "אופניים"];

pub fn sender_menu() -> Keyboard {
    Keyboard::single_column(&[BTN_NEW_SHIPMENT, BTN_MY_SHIPMENTS, BTN_HELP])
}

pub fn courier_menu() -> Keyboard {
    Keyboard {
        rows: vec![
            vec![BTN_AVAILABLE.into(), BTN_ACTIVE.into()],
            vec![BTN_WALLET.into(), BTN_HISTORY.into()],
            vec![BTN_CHANGE_AREA.into(), BTN_DEPOSIT.into()],
            vec![BTN_SUPPORT.into()],
        ],
    }
}

/// Dispatchers see the union of the courier menu and their own tools.
pub fn dispatcher_menu() -> Keyboard {
    let mut kb = courier_menu();
    kb.rows.push(vec![BTN_ADD_SHIPMENT.into(), BTN_MANUAL_CHARGE.into()]);
    kb.rows.push(vec![BTN_STATION_ACTIVE.into(), BTN_STATION_HISTORY.into()]);
    kb
}

pub fn station_menu() -> Keyboard {
    Keyboard {
        rows: vec![
            vec![BTN_MANAGE_DISPATCHERS.into(), BTN_MANAGE_OWNERS.into()],
            vec![BTN_STATION_WALLET.into(), BTN_COLLECTION_REPORT.into()],
            vec![BTN_BLACKLIST.into(), BTN_GROUP_SETTINGS.into()],
        ],
    }
}

pub fn add_remove_menu() -> Keyboard {
    Keyboard::single_column(&[BTN_ADD, BTN_REMOVE, BTN_BACK])
}

pub fn station_wallet_menu() -> Keyboard {
    Keyboard::single_column(&[BTN_SET_COMMISSION, BTN_BACK])
}

pub fn confirm_cancel() -> Keyboard {
    Keyboard {
        rows: vec![vec![BTN_CONFIRM.into(), BTN_CANCEL.into()]],
    }
}

pub fn skip_keyboard() -> Keyboard {
    Keyboard::single_column(&[BTN_SKIP])
}

pub fn urgency_keyboard() -> Keyboard {
    Keyboard {
        rows: vec![vec![URGENCY_IMMEDIATE.into(), URGENCY_SCHEDULED.into()]],
    }
}

pub fn vehicle_keyboard() -> Keyboard {
    Keyboard {
        rows: vec![VEHICLE_CATEGORIES.iter().map(|s| s.to_string()).collect()],
    }
}

pub fn terms_keyboard() -> Keyboard {
    Keyboard::single_column(&[BTN_CONFIRM])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_menu_is_superset_of_courier() {
        let courier = courier_menu();
        let dispatcher = dispatcher_menu();
        for row in &courier.rows {
            assert!(dispatcher.rows.contains(row));
        }
        assert!(dispatcher
            .rows
            .iter()
            .any(|r| r.contains(&BTN_ADD_SHIPMENT.to_string())));
    }

    #[test]
    fn test_menus_are_non_empty() {
        for kb in [sender_menu(), courier_menu(), station_menu(), dispatcher_menu()] {
            assert!(!kb.is_empty());
        }
    }
}
