//! The directed transition multigraph, declared per role.
//!
//! `transition_allowed(from, to)` answers edge membership; staying in place
//! is always allowed (re-prompt on invalid input). Anything else must be an
//! explicit edge, or `force_state` for administrative resets.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use super::state::*;

/// All declared edges. Kept as one flat list so the graph is reviewable in
/// a single screen per role.
static EDGES: Lazy<HashSet<(&'static str, &'static str)>> = Lazy::new(|| {
    let mut edges: HashSet<(&'static str, &'static str)> = HashSet::new();

    // Entry: fresh sessions fan out to a role surface.
    for target in [
        SENDER_NEW,
        SENDER_REGISTER_COLLECT_NAME,
        SENDER_MENU,
        COURIER_ONBOARD_NAME,
        COURIER_MENU,
        COURIER_PENDING_APPROVAL,
        DISPATCHER_MENU,
        STATION_MENU,
        ADMIN_MENU,
    ] {
        edges.insert((INITIAL, target));
    }

    // Sender registration and menu.
    edges.insert((SENDER_NEW, SENDER_REGISTER_COLLECT_NAME));
    edges.insert((SENDER_REGISTER_COLLECT_NAME, SENDER_MENU));

    // Sender delivery-creation wizard: a straight line with a confirm tail.
    let create_chain = [
        SENDER_MENU,
        SENDER_CREATE_PICKUP_CITY,
        SENDER_CREATE_PICKUP_STREET,
        SENDER_CREATE_PICKUP_NUMBER,
        SENDER_CREATE_PICKUP_APARTMENT,
        SENDER_CREATE_DROPOFF_CITY,
        SENDER_CREATE_DROPOFF_STREET,
        SENDER_CREATE_DROPOFF_NUMBER,
        SENDER_CREATE_DROPOFF_APARTMENT,
        SENDER_CREATE_URGENCY,
    ];
    for pair in create_chain.windows(2) {
        edges.insert((pair[0], pair[1]));
    }
    // Urgency branches: optional time and price, or straight to description.
    edges.insert((SENDER_CREATE_URGENCY, SENDER_CREATE_TIME));
    edges.insert((SENDER_CREATE_URGENCY, SENDER_CREATE_DESCRIPTION));
    edges.insert((SENDER_CREATE_TIME, SENDER_CREATE_PRICE));
    edges.insert((SENDER_CREATE_TIME, SENDER_CREATE_DESCRIPTION));
    edges.insert((SENDER_CREATE_PRICE, SENDER_CREATE_DESCRIPTION));
    edges.insert((SENDER_CREATE_DESCRIPTION, SENDER_CREATE_CONFIRM));
    edges.insert((SENDER_CREATE_CONFIRM, SENDER_MENU));

    // Courier onboarding chain, then the pending gate and the menu.
    let onboard_chain = [
        COURIER_ONBOARD_NAME,
        COURIER_ONBOARD_ID_DOC,
        COURIER_ONBOARD_SELFIE,
        COURIER_ONBOARD_VEHICLE_CATEGORY,
        COURIER_ONBOARD_VEHICLE_PHOTO,
        COURIER_ONBOARD_TERMS,
        COURIER_PENDING_APPROVAL,
    ];
    for pair in onboard_chain.windows(2) {
        edges.insert((pair[0], pair[1]));
    }
    edges.insert((COURIER_PENDING_APPROVAL, COURIER_MENU));
    edges.insert((COURIER_MENU, COURIER_CHANGE_AREA));
    edges.insert((COURIER_CHANGE_AREA, COURIER_MENU));
    edges.insert((COURIER_MENU, COURIER_DEPOSIT_AMOUNT));
    edges.insert((COURIER_DEPOSIT_AMOUNT, COURIER_DEPOSIT_UPLOAD));
    edges.insert((COURIER_DEPOSIT_UPLOAD, COURIER_MENU));

    // Dispatcher wizards. Each branch completes or cancels back to the
    // menu before global keywords work again.
    edges.insert((DISPATCHER_MENU, DISPATCHER_ADD_SHIPMENT_PICKUP));
    edges.insert((DISPATCHER_ADD_SHIPMENT_PICKUP, DISPATCHER_ADD_SHIPMENT_DROPOFF));
    edges.insert((DISPATCHER_ADD_SHIPMENT_DROPOFF, DISPATCHER_ADD_SHIPMENT_FEE));
    edges.insert((DISPATCHER_ADD_SHIPMENT_FEE, DISPATCHER_ADD_SHIPMENT_CONFIRM));
    edges.insert((DISPATCHER_ADD_SHIPMENT_CONFIRM, DISPATCHER_MENU));
    edges.insert((DISPATCHER_MENU, DISPATCHER_CHARGE_PHONE));
    edges.insert((DISPATCHER_CHARGE_PHONE, DISPATCHER_CHARGE_AMOUNT));
    edges.insert((DISPATCHER_CHARGE_AMOUNT, DISPATCHER_CHARGE_REASON));
    edges.insert((DISPATCHER_CHARGE_REASON, DISPATCHER_CHARGE_CONFIRM));
    edges.insert((DISPATCHER_CHARGE_CONFIRM, DISPATCHER_MENU));
    // Wizard cancellation.
    for from in [
        DISPATCHER_ADD_SHIPMENT_PICKUP,
        DISPATCHER_ADD_SHIPMENT_DROPOFF,
        DISPATCHER_ADD_SHIPMENT_FEE,
        DISPATCHER_CHARGE_PHONE,
        DISPATCHER_CHARGE_AMOUNT,
        DISPATCHER_CHARGE_REASON,
    ] {
        edges.insert((from, DISPATCHER_MENU));
    }

    // Station owner management surfaces.
    for submenu in [
        STATION_DISPATCHERS_MENU,
        STATION_OWNERS_MENU,
        STATION_WALLET_MENU,
        STATION_BLACKLIST_MENU,
        STATION_GROUP_SET,
    ] {
        edges.insert((STATION_MENU, submenu));
        edges.insert((submenu, STATION_MENU));
    }
    edges.insert((STATION_DISPATCHERS_MENU, STATION_DISPATCHERS_ADD_PHONE));
    edges.insert((STATION_DISPATCHERS_MENU, STATION_DISPATCHERS_REMOVE_PHONE));
    edges.insert((STATION_DISPATCHERS_ADD_PHONE, STATION_DISPATCHERS_MENU));
    edges.insert((STATION_DISPATCHERS_REMOVE_PHONE, STATION_DISPATCHERS_REMOVE_CONFIRM));
    edges.insert((STATION_DISPATCHERS_REMOVE_CONFIRM, STATION_DISPATCHERS_MENU));
    edges.insert((STATION_OWNERS_MENU, STATION_OWNERS_ADD_PHONE));
    edges.insert((STATION_OWNERS_MENU, STATION_OWNERS_REMOVE_PHONE));
    edges.insert((STATION_OWNERS_ADD_PHONE, STATION_OWNERS_MENU));
    edges.insert((STATION_OWNERS_REMOVE_PHONE, STATION_OWNERS_REMOVE_CONFIRM));
    edges.insert((STATION_OWNERS_REMOVE_CONFIRM, STATION_OWNERS_MENU));
    edges.insert((STATION_WALLET_MENU, STATION_WALLET_COMMISSION));
    edges.insert((STATION_WALLET_COMMISSION, STATION_WALLET_MENU));
    edges.insert((STATION_BLACKLIST_MENU, STATION_BLACKLIST_ADD_PHONE));
    edges.insert((STATION_BLACKLIST_MENU, STATION_BLACKLIST_REMOVE_PHONE));
    edges.insert((STATION_BLACKLIST_ADD_PHONE, STATION_BLACKLIST_MENU));
    edges.insert((STATION_BLACKLIST_REMOVE_PHONE, STATION_BLACKLIST_MENU));
    edges.insert((STATION_GROUP_SET, STATION_MENU));

    edges
});

/// Whether `from → to` is a declared edge. Self-transitions are always
/// allowed (staying in place to re-prompt).
pub fn transition_allowed(from: &str, to: &str) -> bool {
    if from == to {
        return true;
    }
    EDGES.contains(&(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_transition_always_allowed() {
        assert!(transition_allowed(SENDER_CREATE_PICKUP_CITY, SENDER_CREATE_PICKUP_CITY));
        assert!(transition_allowed("SOME.UNKNOWN", "SOME.UNKNOWN"));
    }

    #[test]
    fn test_sender_wizard_is_a_chain() {
        assert!(transition_allowed(SENDER_MENU, SENDER_CREATE_PICKUP_CITY));
        assert!(transition_allowed(SENDER_CREATE_PICKUP_CITY, SENDER_CREATE_PICKUP_STREET));
        assert!(transition_allowed(SENDER_CREATE_DESCRIPTION, SENDER_CREATE_CONFIRM));
        assert!(transition_allowed(SENDER_CREATE_CONFIRM, SENDER_MENU));
        // Skipping steps is not an edge.
        assert!(!transition_allowed(SENDER_CREATE_PICKUP_CITY, SENDER_CREATE_DROPOFF_CITY));
        assert!(!transition_allowed(SENDER_MENU, SENDER_CREATE_CONFIRM));
    }

    #[test]
    fn test_urgency_optional_branches() {
        assert!(transition_allowed(SENDER_CREATE_URGENCY, SENDER_CREATE_TIME));
        assert!(transition_allowed(SENDER_CREATE_URGENCY, SENDER_CREATE_DESCRIPTION));
        assert!(transition_allowed(SENDER_CREATE_TIME, SENDER_CREATE_DESCRIPTION));
    }

    #[test]
    fn test_onboarding_order_is_enforced() {
        assert!(transition_allowed(COURIER_ONBOARD_NAME, COURIER_ONBOARD_ID_DOC));
        assert!(!transition_allowed(COURIER_ONBOARD_NAME, COURIER_ONBOARD_SELFIE));
        assert!(!transition_allowed(COURIER_ONBOARD_ID_DOC, COURIER_MENU));
        assert!(transition_allowed(COURIER_ONBOARD_TERMS, COURIER_PENDING_APPROVAL));
    }

    #[test]
    fn test_cross_role_jumps_are_rejected() {
        assert!(!transition_allowed(SENDER_MENU, COURIER_MENU));
        assert!(!transition_allowed(COURIER_MENU, DISPATCHER_MENU));
        assert!(!transition_allowed(DISPATCHER_MENU, STATION_MENU));
    }

    #[test]
    fn test_dispatcher_wizard_cancel_returns_to_menu() {
        assert!(transition_allowed(DISPATCHER_ADD_SHIPMENT_FEE, DISPATCHER_MENU));
        assert!(transition_allowed(DISPATCHER_CHARGE_AMOUNT, DISPATCHER_MENU));
    }
}
