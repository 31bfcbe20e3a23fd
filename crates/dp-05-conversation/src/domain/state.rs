//! Conversation state identifiers.
//!
//! A state is a dotted string with a role prefix (`SENDER.*`, `COURIER.*`,
//! `DISPATCHER.*`, `STATION.*`) plus the shared `INITIAL`. Multi-step flows
//! are recognized by prefix so free text typed mid-flow (an address, a
//! name) can never trigger keyword navigation.

/// Shared entry state for brand-new sessions.
pub const INITIAL: &str = "INITIAL";

// --- Sender ---
pub const SENDER_NEW: &str = "SENDER.NEW";
pub const SENDER_REGISTER_COLLECT_NAME: &str = "SENDER.REGISTER.COLLECT_NAME";
pub const SENDER_MENU: &str = "SENDER.MENU";
pub const SENDER_CREATE_PICKUP_CITY: &str = "SENDER.CREATE.PICKUP_CITY";
pub const SENDER_CREATE_PICKUP_STREET: &str = "SENDER.CREATE.PICKUP_STREET";
pub const SENDER_CREATE_PICKUP_NUMBER: &str = "SENDER.CREATE.PICKUP_NUMBER";
pub const SENDER_CREATE_PICKUP_APARTMENT: &str = "SENDER.CREATE.PICKUP_APARTMENT";
pub const SENDER_CREATE_DROPOFF_CITY: &str = "SENDER.CREATE.DROPOFF_CITY";
pub const SENDER_CREATE_DROPOFF_STREET: &str = "SENDER.CREATE.DROPOFF_STREET";
pub const SENDER_CREATE_DROPOFF_NUMBER: &str = "SENDER.CREATE.DROPOFF_NUMBER";
pub const SENDER_CREATE_DROPOFF_APARTMENT: &str = "SENDER.CREATE.DROPOFF_APARTMENT";
pub const SENDER_CREATE_URGENCY: &str = "SENDER.CREATE.URGENCY";
pub const SENDER_CREATE_TIME: &str = "SENDER.CREATE.TIME";
pub const SENDER_CREATE_PRICE: &str = "SENDER.CREATE.PRICE";
pub const SENDER_CREATE_DESCRIPTION: &str = "SENDER.CREATE.DESCRIPTION";
pub const SENDER_CREATE_CONFIRM: &str = "SENDER.CREATE.CONFIRM";

// --- Courier ---
pub const COURIER_ONBOARD_NAME: &str = "COURIER.ONBOARD.NAME";
pub const COURIER_ONBOARD_ID_DOC: &str = "COURIER.ONBOARD.ID_DOC";
pub const COURIER_ONBOARD_SELFIE: &str = "COURIER.ONBOARD.SELFIE";
pub const COURIER_ONBOARD_VEHICLE_CATEGORY: &str = "COURIER.ONBOARD.VEHICLE_CATEGORY";
pub const COURIER_ONBOARD_VEHICLE_PHOTO: &str = "COURIER.ONBOARD.VEHICLE_PHOTO";
pub const COURIER_ONBOARD_TERMS: &str = "COURIER.ONBOARD.TERMS";
pub const COURIER_PENDING_APPROVAL: &str = "COURIER.PENDING_APPROVAL";
pub const COURIER_MENU: &str = "COURIER.MENU";
pub const COURIER_CHANGE_AREA: &str = "COURIER.CHANGE_AREA";
pub const COURIER_DEPOSIT_AMOUNT: &str = "COURIER.DEPOSIT.AMOUNT";
pub const COURIER_DEPOSIT_UPLOAD: &str = "COURIER.DEPOSIT.UPLOAD";

// --- Dispatcher ---
pub const DISPATCHER_MENU: &str = "DISPATCHER.MENU";
pub const DISPATCHER_ADD_SHIPMENT_PICKUP: &str = "DISPATCHER.ADD_SHIPMENT.PICKUP";
pub const DISPATCHER_ADD_SHIPMENT_DROPOFF: &str = "DISPATCHER.ADD_SHIPMENT.DROPOFF";
pub const DISPATCHER_ADD_SHIPMENT_FEE: &str = "DISPATCHER.ADD_SHIPMENT.FEE";
pub const DISPATCHER_ADD_SHIPMENT_CONFIRM: &str = "DISPATCHER.ADD_SHIPMENT.CONFIRM";
pub const DISPATCHER_CHARGE_PHONE: &str = "DISPATCHER.CHARGE.PHONE";
pub const DISPATCHER_CHARGE_AMOUNT: &str = "DISPATCHER.CHARGE.AMOUNT";
pub const DISPATCHER_CHARGE_REASON: &str = "DISPATCHER.CHARGE.REASON";
pub const DISPATCHER_CHARGE_CONFIRM: &str = "DISPATCHER.CHARGE.CONFIRM";

// --- Station owner ---
pub const STATION_MENU: &str = "STATION.MENU";
pub const STATION_DISPATCHERS_MENU: &str = "STATION.DISPATCHERS.MENU";
pub const STATION_DISPATCHERS_ADD_PHONE: &str = "STATION.DISPATCHERS.ADD_PHONE";
pub const STATION_DISPATCHERS_REMOVE_PHONE: &str = "STATION.DISPATCHERS.REMOVE_PHONE";
pub const STATION_DISPATCHERS_REMOVE_CONFIRM: &str = "STATION.DISPATCHERS.REMOVE_CONFIRM";
pub const STATION_OWNERS_MENU: &str = "STATION.OWNERS.MENU";
pub const STATION_OWNERS_ADD_PHONE: &str = "STATION.OWNERS.ADD_PHONE";
pub const STATION_OWNERS_REMOVE_PHONE: &str = "STATION.OWNERS.REMOVE_PHONE";
pub const STATION_OWNERS_REMOVE_CONFIRM: &str = "STATION.OWNERS.REMOVE_CONFIRM";
pub const STATION_WALLET_MENU: &str = "STATION.WALLET.MENU";
pub const STATION_WALLET_COMMISSION: &str = "STATION.WALLET.COMMISSION";
pub const STATION_BLACKLIST_MENU: &str = "STATION.BLACKLIST.MENU";
pub const STATION_BLACKLIST_ADD_PHONE: &str = "STATION.BLACKLIST.ADD_PHONE";
pub const STATION_BLACKLIST_REMOVE_PHONE: &str = "STATION.BLACKLIST.REMOVE_PHONE";
pub const STATION_GROUP_SET: &str = "STATION.GROUP.SET";

// --- Admin ---
pub const ADMIN_MENU: &str = "ADMIN.MENU";

/// State prefixes that mark a multi-step flow. While the current state is
/// inside one of these, global keyword routing ("menu", "back", marketing
/// keywords) is suppressed so free-text content cannot hijack navigation.
const MULTI_STEP_PREFIXES: &[&str] = &[
    "SENDER.REGISTER.",
    "SENDER.CREATE.",
    "COURIER.ONBOARD.",
    "COURIER.CHANGE_AREA",
    "COURIER.DEPOSIT.",
    "DISPATCHER.",
    "STATION.",
];

/// Menu states are excluded from the guard even under a guarded prefix:
/// keyword navigation from a menu is exactly what menus are for.
const MENU_STATES: &[&str] = &[
    SENDER_MENU,
    COURIER_MENU,
    DISPATCHER_MENU,
    STATION_MENU,
    ADMIN_MENU,
    COURIER_PENDING_APPROVAL,
];

/// True while the session is mid-flow and keyword routing must not fire.
pub fn is_in_multi_step_flow(state: &str) -> bool {
    if MENU_STATES.contains(&state) {
        return false;
    }
    MULTI_STEP_PREFIXES
        .iter()
        .any(|prefix| state.starts_with(prefix))
}

/// The role prefix of a state (`SENDER`, `COURIER`, …), or the whole state
/// for un-prefixed ones like `INITIAL`.
pub fn role_prefix(state: &str) -> &str {
    state.split('.').next().unwrap_or(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menus_allow_keywords() {
        assert!(!is_in_multi_step_flow(SENDER_MENU));
        assert!(!is_in_multi_step_flow(COURIER_MENU));
        assert!(!is_in_multi_step_flow(DISPATCHER_MENU));
        assert!(!is_in_multi_step_flow(STATION_MENU));
        assert!(!is_in_multi_step_flow(INITIAL));
    }

    #[test]
    fn test_flows_suppress_keywords() {
        assert!(is_in_multi_step_flow(SENDER_CREATE_PICKUP_STREET));
        assert!(is_in_multi_step_flow(SENDER_REGISTER_COLLECT_NAME));
        assert!(is_in_multi_step_flow(COURIER_ONBOARD_SELFIE));
        assert!(is_in_multi_step_flow(DISPATCHER_ADD_SHIPMENT_FEE));
        assert!(is_in_multi_step_flow(DISPATCHER_CHARGE_AMOUNT));
        assert!(is_in_multi_step_flow(STATION_BLACKLIST_ADD_PHONE));
    }

    #[test]
    fn test_role_prefix() {
        assert_eq!(role_prefix(SENDER_CREATE_CONFIRM), "SENDER");
        assert_eq!(role_prefix(DISPATCHER_MENU), "DISPATCHER");
        assert_eq!(role_prefix(INITIAL), "INITIAL");
    }
}
