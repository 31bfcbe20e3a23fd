//! End-to-end conversation scenarios against the in-memory adapters.
//!
//! These walk the same engine, router, and handlers production uses; only
//! the session store and the business services are in-memory doubles.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal_macros::dec;
    use shared_types::{DeliveryStatus, MediaRef, Platform, Role};

    use dp_05_conversation::adapters::{MemorySessionStore, MockServices};
    use dp_05_conversation::ConversationServices;
    use dp_05_conversation::domain::state;
    use dp_05_conversation::{ConversationEngine, HandlerReply};

    use crate::integration::fixtures::{approved_courier, station, user};

    fn engine_with(
        services: Arc<MockServices>,
    ) -> (ConversationEngine, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        let engine = ConversationEngine::new(store.clone(), services);
        (engine, store)
    }

    async fn send(
        engine: &ConversationEngine,
        user: &shared_types::User,
        text: &str,
    ) -> HandlerReply {
        engine.handle_message(user, text, None).await.unwrap()
    }

    async fn send_media(
        engine: &ConversationEngine,
        user: &shared_types::User,
        file_id: &str,
    ) -> HandlerReply {
        let media = MediaRef {
            url: file_id.to_string(),
            kind: "photo".to_string(),
            caption: None,
            mime_type: None,
        };
        engine.handle_message(user, "", Some(&media)).await.unwrap()
    }


    async fn seed_shipment(
        services: &MockServices,
        station_id: Option<i64>,
        fee: rust_decimal::Decimal,
    ) -> shared_types::Delivery {
        services
            .create_shipment(dp_04_shipment::NewShipmentRequest {
                sender_id: 1,
                station_id,
                pickup_address: "א".repeat(10),
                pickup_contact_name: None,
                pickup_contact_phone: None,
                dropoff_address: "ב".repeat(10),
                dropoff_contact_name: None,
                dropoff_contact_phone: None,
                fee,
                notes: None,
            })
            .await
            .unwrap()
    }

    // =========================================================================
    // SENDER REGISTRATION + SHIPMENT CREATION
    // =========================================================================

    #[tokio::test]
    async fn test_sender_registration_then_shipment_happy_path() {
        let services = Arc::new(MockServices::new());
        let sender = user(42, Role::Sender);
        services.add_user(sender.clone());
        let (engine, store) = engine_with(services.clone());

        // "start" lands a brand-new sender in name collection.
        let reply = send(&engine, &sender, "start").await;
        assert_eq!(reply.new_state, state::SENDER_REGISTER_COLLECT_NAME);

        // Name is stored and the menu opens.
        let reply = send(&engine, &sender, "יוסי").await;
        assert_eq!(reply.new_state, state::SENDER_MENU);
        assert!(reply.text.contains("יוסי"));
        assert_eq!(
            services.users.lock().get(&42).unwrap().display_name,
            "יוסי"
        );

        // Walk the wizard.
        let named_sender = {
            let mut s = sender.clone();
            s.display_name = "יוסי".to_string();
            s
        };
        send(&engine, &named_sender, "משלוח חדש").await;
        send(&engine, &named_sender, "תל אביב").await;
        send(&engine, &named_sender, "הרצל").await;
        send(&engine, &named_sender, "5").await;
        send(&engine, &named_sender, "דלג").await;
        send(&engine, &named_sender, "חיפה").await;
        send(&engine, &named_sender, "הנמל").await;
        send(&engine, &named_sender, "2").await;
        send(&engine, &named_sender, "דלג").await;
        let reply = send(&engine, &named_sender, "מיידי").await;
        assert_eq!(reply.new_state, state::SENDER_CREATE_DESCRIPTION);
        let reply = send(&engine, &named_sender, "מסמכים").await;
        assert_eq!(reply.new_state, state::SENDER_CREATE_CONFIRM);
        assert!(reply.text.contains("מסמכים"));

        let reply = send(&engine, &named_sender, "אישור").await;
        assert_eq!(reply.new_state, state::SENDER_MENU);

        // The shipment exists: OPEN, default fee 10.00, assembled addresses.
        let deliveries = services.deliveries.lock();
        assert_eq!(deliveries.len(), 1);
        let delivery = deliveries.values().next().unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Open);
        assert_eq!(delivery.fee, dec!(10.00));
        assert!(delivery.pickup_address.contains("תל אביב"));
        assert!(delivery.dropoff_address.contains("חיפה"));
        drop(deliveries);

        // Context was cleared on completion.
        assert!(store.context_of(42, Platform::Bot).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_free_text_cannot_trigger_navigation_mid_flow() {
        let services = Arc::new(MockServices::new());
        let mut sender = user(1, Role::Sender);
        sender.display_name = "דנה".to_string();
        services.add_user(sender.clone());
        let (engine, store) = engine_with(services);

        send(&engine, &sender, "menu").await;
        send(&engine, &sender, "משלוח חדש").await;
        send(&engine, &sender, "תל אביב").await;

        // "תפריט" typed where a street is expected is data, not navigation.
        let reply = send(&engine, &sender, "תפריט").await;
        assert_eq!(reply.new_state, state::SENDER_CREATE_PICKUP_NUMBER);
        let ctx = store.context_of(1, Platform::Bot).unwrap();
        assert_eq!(ctx.get("pickup_street").unwrap(), "תפריט");
    }

    #[tokio::test]
    async fn test_start_mid_flow_wipes_context() {
        let services = Arc::new(MockServices::new());
        let mut sender = user(2, Role::Sender);
        sender.display_name = "רון".to_string();
        services.add_user(sender.clone());
        let (engine, store) = engine_with(services);

        send(&engine, &sender, "menu").await;
        send(&engine, &sender, "משלוח חדש").await;
        send(&engine, &sender, "תל אביב").await;
        assert!(!store.context_of(2, Platform::Bot).unwrap().is_empty());

        let reply = send(&engine, &sender, "/start").await;
        assert_eq!(reply.new_state, state::SENDER_MENU);
        assert!(store.context_of(2, Platform::Bot).unwrap().is_empty());
    }

    // =========================================================================
    // COURIER ONBOARDING
    // =========================================================================

    #[tokio::test]
    async fn test_courier_onboarding_collects_documents_in_order() {
        let services = Arc::new(MockServices::new());
        let sender = user(7, Role::Sender);
        services.add_user(sender.clone());
        let (engine, store) = engine_with(services.clone());

        // Join keyword flips the role and starts onboarding.
        let reply = send(&engine, &sender, "הצטרפות").await;
        assert_eq!(reply.new_state, state::COURIER_ONBOARD_NAME);
        assert_eq!(services.users.lock().get(&7).unwrap().role, Role::Courier);

        let courier = {
            let mut u = sender.clone();
            u.role = Role::Courier;
            u
        };
        send(&engine, &courier, "יוסי כהן").await;

        // Text where a document is required does not advance.
        let reply = send(&engine, &courier, "אין לי").await;
        assert_eq!(reply.new_state, state::COURIER_ONBOARD_ID_DOC);

        send_media(&engine, &courier, "id-doc-file").await;
        send_media(&engine, &courier, "selfie-file").await;
        send(&engine, &courier, "אופנוע").await;
        send_media(&engine, &courier, "vehicle-file").await;
        let reply = send(&engine, &courier, "אישור").await;
        assert_eq!(reply.new_state, state::COURIER_PENDING_APPROVAL);

        let users = services.users.lock();
        let stored = users.get(&7).unwrap();
        assert_eq!(stored.full_name.as_deref(), Some("יוסי כהן"));
        assert_eq!(stored.id_document_ref.as_deref(), Some("id-doc-file"));
        assert_eq!(stored.selfie_ref.as_deref(), Some("selfie-file"));
        assert_eq!(stored.vehicle_category.as_deref(), Some("אופנוע"));
        assert!(stored.terms_accepted_at.is_some());
        drop(users);

        // An admin was notified about the pending courier.
        assert_eq!(services.admin_notes.lock().len(), 1);
        let _ = store;
    }

    // =========================================================================
    // CAPTURE CALLBACKS
    // =========================================================================

    #[tokio::test]
    async fn test_capture_callback_debits_wallet() {
        let services = Arc::new(MockServices::new());
        let courier = approved_courier(99);
        services.add_user(courier.clone());
        services.set_balance(99, dec!(-100), dec!(-500));

        let sender = user(1, Role::Sender);
        services.add_user(sender.clone());
        let (engine, _) = engine_with(services.clone());

        // Seed an open non-station delivery.
        let delivery = seed_shipment(&services, None, dec!(25)).await;

        let reply = send(&engine, &courier, &format!("capture:{}", delivery.token)).await;
        assert!(reply.text.contains("-125"));
        assert_eq!(
            services.delivery_status(delivery.id),
            Some(DeliveryStatus::Captured)
        );
        assert_eq!(services.wallets.lock().get(&99).unwrap().balance, dec!(-125));
    }

    #[tokio::test]
    async fn test_capture_callback_insufficient_credit_leaves_delivery_open() {
        let services = Arc::new(MockServices::new());
        let courier = approved_courier(99);
        services.add_user(courier.clone());
        services.set_balance(99, dec!(-480), dec!(-500));
        services.add_user(user(1, Role::Sender));
        let (engine, _) = engine_with(services.clone());

        let delivery = seed_shipment(&services, None, dec!(50)).await;

        let reply = send(&engine, &courier, &format!("capture:{}", delivery.token)).await;
        // Localized refusal with the exact balance and limit.
        assert!(reply.text.contains("-480"));
        assert!(reply.text.contains("-500"));
        assert_eq!(services.delivery_status(delivery.id), Some(DeliveryStatus::Open));
        assert_eq!(services.wallets.lock().get(&99).unwrap().balance, dec!(-480));
    }

    #[tokio::test]
    async fn test_station_shipment_goes_to_pending_approval() {
        let services = Arc::new(MockServices::new());
        let courier = approved_courier(50);
        services.add_user(courier.clone());
        services.add_user(user(1, Role::Sender));
        services.add_station(station(3, "מרכז"));
        let (engine, _) = engine_with(services.clone());

        let delivery = seed_shipment(&services, Some(3), dec!(30)).await;

        let reply = send(&engine, &courier, &format!("capture:{}", delivery.token)).await;
        assert!(reply.text.contains("לאישור"));
        assert_eq!(
            services.delivery_status(delivery.id),
            Some(DeliveryStatus::PendingApproval)
        );
        // No debit until a dispatcher approves.
        let wallets = services.wallets.lock();
        assert!(wallets.get(&50).map(|w| w.balance).unwrap_or_default() == dec!(0));
    }

    // =========================================================================
    // DISPATCHER
    // =========================================================================

    #[tokio::test]
    async fn test_dispatcher_sees_union_menu_and_approves() {
        let services = Arc::new(MockServices::new());
        let dispatcher = approved_courier(60);
        services.add_user(dispatcher.clone());
        services.add_station(station(3, "מרכז"));
        services.make_dispatcher(60, 3);

        let requester = approved_courier(61);
        services.add_user(requester.clone());
        services.add_user(user(1, Role::Sender));
        let (engine, store) = engine_with(services.clone());

        // Dispatcher role menu.
        let reply = send(&engine, &dispatcher, "menu").await;
        assert_eq!(reply.new_state, state::DISPATCHER_MENU);

        // A courier requests a station shipment.
        let delivery = seed_shipment(&services, Some(3), dec!(40)).await;
        services.claim_by_token(&delivery.token, 61).await.unwrap();

        // Dispatcher approves; the requesting courier is debited.
        let reply = send(&engine, &dispatcher, &format!("approve:{}", delivery.token)).await;
        assert!(reply.text.contains("אושר"));
        assert_eq!(
            services.delivery_status(delivery.id),
            Some(DeliveryStatus::Captured)
        );
        assert_eq!(services.wallets.lock().get(&61).unwrap().balance, dec!(-40));
        let _ = store;
    }

    #[tokio::test]
    async fn test_dispatcher_manual_charge_wizard() {
        let services = Arc::new(MockServices::new());
        let dispatcher = approved_courier(60);
        services.add_user(dispatcher.clone());
        services.add_station(station(3, "מרכז"));
        services.make_dispatcher(60, 3);

        let mut target = approved_courier(70);
        target.phone = "+972501234567".to_string();
        services.add_user(target.clone());
        services.set_balance(70, dec!(0), dec!(-500));
        let (engine, store) = engine_with(services.clone());

        send(&engine, &dispatcher, "menu").await;
        send(&engine, &dispatcher, "חיוב ידני").await;
        send(&engine, &dispatcher, "050-123-4567").await;
        send(&engine, &dispatcher, "80").await;
        send(&engine, &dispatcher, "ציוד").await;
        let reply = send(&engine, &dispatcher, "אישור").await;

        assert_eq!(reply.new_state, state::DISPATCHER_MENU);
        assert!(reply.text.contains("-80"));
        assert_eq!(services.wallets.lock().get(&70).unwrap().balance, dec!(-80));
        assert!(store.context_of(60, Platform::Bot).unwrap().is_empty());
    }

    // =========================================================================
    // STATION OWNER
    // =========================================================================

    #[tokio::test]
    async fn test_station_owner_removal_requires_confirmation() {
        let services = Arc::new(MockServices::new());
        let mut owner = user(80, Role::StationOwner);
        owner.display_name = "בעלים".to_string();
        services.add_user(owner.clone());
        services.add_station(station(3, "מרכז"));
        services.make_owner(80, 3);

        let mut dispatcher = approved_courier(81);
        dispatcher.phone = "+972509998877".to_string();
        dispatcher.display_name = "סדרן".to_string();
        services.add_user(dispatcher.clone());
        services.make_dispatcher(81, 3);
        let (engine, _) = engine_with(services.clone());

        send(&engine, &owner, "menu").await;
        send(&engine, &owner, "ניהול סדרנים").await;
        send(&engine, &owner, "הסרה").await;
        let reply = send(&engine, &owner, "0509998877").await;
        assert_eq!(reply.new_state, state::STATION_DISPATCHERS_REMOVE_CONFIRM);
        assert!(reply.text.contains("סדרן"));

        // Still a dispatcher until confirmed.
        assert!(services.dispatcher_of.lock().contains_key(&81));
        send(&engine, &owner, "אישור").await;
        assert!(!services.dispatcher_of.lock().contains_key(&81));
    }

    #[tokio::test]
    async fn test_owner_without_station_gets_explicit_error_menu() {
        let services = Arc::new(MockServices::new());
        let owner = user(90, Role::StationOwner);
        services.add_user(owner.clone());
        let (engine, _) = engine_with(services);

        let reply = send(&engine, &owner, "menu").await;
        assert!(reply.text.contains("לא נמצאה תחנה"));
    }

    // =========================================================================
    // FORCE-STATE (ADMIN RESET)
    // =========================================================================

    #[tokio::test]
    async fn test_force_state_resets_a_stuck_dispatcher() {
        let services = Arc::new(MockServices::new());
        let dispatcher = approved_courier(60);
        services.add_user(dispatcher.clone());
        services.add_station(station(3, "מרכז"));
        services.make_dispatcher(60, 3);
        let (engine, store) = engine_with(services);

        send(&engine, &dispatcher, "menu").await;
        send(&engine, &dispatcher, "הוספת משלוח").await;
        send(&engine, &dispatcher, "רחוב הרצל 5, תל אביב").await;
        send(&engine, &dispatcher, "רחוב הנמל 2, חיפה").await;
        assert_eq!(
            store.state_of(60, Platform::Bot).unwrap(),
            state::DISPATCHER_ADD_SHIPMENT_FEE
        );

        // Operator resets the stuck session.
        engine
            .force_state(60, Platform::Bot, state::DISPATCHER_MENU, true)
            .await
            .unwrap();
        assert_eq!(
            store.state_of(60, Platform::Bot).unwrap(),
            state::DISPATCHER_MENU
        );
        assert!(store.context_of(60, Platform::Bot).unwrap().is_empty());

        // The next message routes from the dispatcher menu again.
        let reply = send(&engine, &dispatcher, "הוספת משלוח").await;
        assert_eq!(reply.new_state, state::DISPATCHER_ADD_SHIPMENT_PICKUP);
    }
}
