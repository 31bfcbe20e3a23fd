//! Postgres-backed capture suites. These need a scratch database and are
//! ignored by default:
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/dispatch_test \
//!     cargo test -p dp-tests -- --ignored
//! ```

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use rust_decimal_macros::dec;
    use shared_types::{DeliveryStatus, DispatchError, Platform};
    use sqlx::PgPool;

    use dp_02_storage::deliveries::NewDelivery;
    use dp_02_storage::webhook_events::ClaimOutcome;
    use dp_02_storage::{deliveries, users, wallets, webhook_events};
    use dp_04_shipment::{generate_token, CaptureKey, ShipmentService};

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required for DB suites");
        let pool = dp_02_storage::connect(&url).await.unwrap();
        dp_02_storage::init_schema(&pool).await.unwrap();
        pool
    }

    fn unique(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!("{prefix}-{nanos}")
    }

    async fn seed_user(pool: &PgPool, role: &str) -> i64 {
        let chat_id = unique("chat");
        let mut conn = pool.acquire().await.unwrap();
        let user = users::upsert_user(
            &mut conn,
            Platform::Bot,
            &chat_id,
            &unique("tg:"),
            "test user",
        )
        .await
        .unwrap();
        sqlx::query("UPDATE users SET role = $2, approval_status = 'approved' WHERE id = $1")
            .bind(user.id)
            .bind(role)
            .execute(&mut *conn)
            .await
            .unwrap();
        user.id
    }

    async fn seed_open_delivery(pool: &PgPool, sender_id: i64, fee: rust_decimal::Decimal) -> i64 {
        let mut conn = pool.acquire().await.unwrap();
        let delivery = deliveries::insert_delivery(
            &mut conn,
            &NewDelivery {
                token: generate_token(),
                sender_id,
                station_id: None,
                pickup_address: "רחוב הרצל 5, תל אביב".into(),
                pickup_contact_name: None,
                pickup_contact_phone: None,
                dropoff_address: "רחוב הנמל 2, חיפה".into(),
                dropoff_contact_name: None,
                dropoff_contact_phone: None,
                fee,
                notes: None,
            },
        )
        .await
        .unwrap();
        delivery.id
    }

    async fn set_balance(pool: &PgPool, courier_id: i64, balance: rust_decimal::Decimal) {
        let mut conn = pool.acquire().await.unwrap();
        wallets::get_or_create_wallet(&mut conn, courier_id).await.unwrap();
        wallets::update_wallet_balance(&mut conn, courier_id, balance)
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_capture_debits_and_transitions_atomically() {
        let pool = test_pool().await;
        let shipments = ShipmentService::new(pool.clone(), 5);

        let sender = seed_user(&pool, "SENDER").await;
        let courier = seed_user(&pool, "COURIER").await;
        set_balance(&pool, courier, dec!(-100)).await;
        let delivery_id = seed_open_delivery(&pool, sender, dec!(25)).await;

        let outcome = shipments
            .capture(CaptureKey::Id(delivery_id), courier, None)
            .await
            .unwrap();
        assert_eq!(outcome.wallet.balance, dec!(-125));
        assert_eq!(outcome.delivery.status, DeliveryStatus::Captured);
        assert_eq!(outcome.delivery.courier_id, Some(courier));

        // Ledger carries the debit with the matching balance_after.
        let mut conn = pool.acquire().await.unwrap();
        let history = wallets::ledger_history(&mut conn, courier, 5).await.unwrap();
        assert_eq!(history[0].amount, dec!(-25));
        assert_eq!(history[0].balance_after, dec!(-125));
        assert_eq!(history[0].delivery_id, Some(delivery_id));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_insufficient_credit_rolls_everything_back() {
        let pool = test_pool().await;
        let shipments = ShipmentService::new(pool.clone(), 5);

        let sender = seed_user(&pool, "SENDER").await;
        let courier = seed_user(&pool, "COURIER").await;
        set_balance(&pool, courier, dec!(-480)).await;
        let delivery_id = seed_open_delivery(&pool, sender, dec!(50)).await;

        let err = shipments
            .capture(CaptureKey::Id(delivery_id), courier, None)
            .await
            .unwrap_err();
        match err {
            DispatchError::InsufficientCredit {
                balance,
                credit_limit,
                fee,
            } => {
                assert_eq!(balance, dec!(-480));
                assert_eq!(credit_limit, dec!(-500));
                assert_eq!(fee, dec!(50));
            }
            other => panic!("expected InsufficientCredit, got {other:?}"),
        }

        // Nothing moved: delivery still OPEN, wallet untouched, no ledger.
        let mut conn = pool.acquire().await.unwrap();
        let delivery = deliveries::get_delivery(&mut conn, delivery_id).await.unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Open);
        assert!(delivery.courier_id.is_none());
        let wallet = wallets::get_or_create_wallet(&mut conn, courier).await.unwrap();
        assert_eq!(wallet.balance, dec!(-480));
        let history = wallets::ledger_history(&mut conn, courier, 5).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_concurrent_capture_exactly_one_wins() {
        let pool = test_pool().await;
        let shipments = ShipmentService::new(pool.clone(), 5);

        let sender = seed_user(&pool, "SENDER").await;
        let courier_a = seed_user(&pool, "COURIER").await;
        let courier_b = seed_user(&pool, "COURIER").await;
        let delivery_id = seed_open_delivery(&pool, sender, dec!(25)).await;

        let (left, right) = tokio::join!(
            shipments.capture(CaptureKey::Id(delivery_id), courier_a, None),
            shipments.capture(CaptureKey::Id(delivery_id), courier_b, None),
        );

        let successes = [&left, &right].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one capture must win");
        let loser = if left.is_ok() { right } else { left };
        assert!(matches!(
            loser.unwrap_err(),
            DispatchError::DeliveryNotAvailable { .. }
        ));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_replayed_debit_is_a_duplicate_charge() {
        let pool = test_pool().await;

        let sender = seed_user(&pool, "SENDER").await;
        let courier = seed_user(&pool, "COURIER").await;
        let delivery_id = seed_open_delivery(&pool, sender, dec!(25)).await;

        // First debit through the engine primitives.
        let mut tx = pool.begin().await.unwrap();
        dp_03_wallet::engine::debit_for_capture(&mut tx, courier, delivery_id, dec!(25), "fee")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        // Replaying the same (courier, delivery, entry_type) must refuse
        // and leave the balance untouched.
        let mut tx = pool.begin().await.unwrap();
        let err = dp_03_wallet::engine::debit_for_capture(
            &mut tx,
            courier,
            delivery_id,
            dec!(25),
            "fee",
        )
        .await
        .unwrap_err();
        tx.rollback().await.unwrap();
        assert!(matches!(err, DispatchError::DuplicateCharge { .. }));

        let mut conn = pool.acquire().await.unwrap();
        let wallet = wallets::get_or_create_wallet(&mut conn, courier).await.unwrap();
        assert_eq!(wallet.balance, dec!(-25));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_inbound_message_id_is_idempotent() {
        let pool = test_pool().await;
        let message_id = unique("bot:m");

        let mut conn = pool.acquire().await.unwrap();
        let first = webhook_events::try_claim(&mut conn, &message_id).await.unwrap();
        let event_id = match first {
            ClaimOutcome::Claimed { event_id } => event_id,
            other => panic!("expected Claimed, got {other:?}"),
        };
        webhook_events::mark_processed(&mut conn, event_id).await.unwrap();

        // Second arrival of the same id short-circuits.
        let second = webhook_events::try_claim(&mut conn, &message_id).await.unwrap();
        assert_eq!(second, ClaimOutcome::Duplicate);
    }
}
