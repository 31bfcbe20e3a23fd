//! Shipment operations. Every mutating method is one transaction; the
//! outbox rows ride in it, so a rollback discards the notifications too.

use chrono::Utc;
use rust_decimal::Decimal;
use shared_types::{
    CourierWallet, Delivery, DeliveryId, DeliveryStatus, DispatchError, DispatchResult, Money,
    OutboundContent, Platform, Role, StationId, UserId, BROADCAST_COURIERS,
};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};

use dp_01_validation::{validate_address, validate_amount};
use dp_02_storage::{db_err, deliveries, outbox, stations, users};
use dp_02_storage::deliveries::NewDelivery;

use crate::notify::{self, message_type};
use crate::token::generate_token;

/// Maximum shipment fee (stricter than the general amount bound).
const MAX_FEE: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Lookup key for capture: internal id (panel, dispatcher flows) or the
/// smart-link token (courier capture surface).
#[derive(Debug, Clone)]
pub enum CaptureKey {
    Id(DeliveryId),
    Token(String),
}

/// Result of a successful capture.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub delivery: Delivery,
    pub wallet: CourierWallet,
    pub commission: Option<Money>,
}

/// Payload for shipment creation, already collected by a conversation flow.
#[derive(Debug, Clone)]
pub struct NewShipmentRequest {
    pub sender_id: UserId,
    pub station_id: Option<StationId>,
    pub pickup_address: String,
    pub pickup_contact_name: Option<String>,
    pub pickup_contact_phone: Option<String>,
    pub dropoff_address: String,
    pub dropoff_contact_name: Option<String>,
    pub dropoff_contact_phone: Option<String>,
    pub fee: Money,
    pub notes: Option<String>,
}

/// Shipment workflow service.
#[derive(Clone)]
pub struct ShipmentService {
    pool: PgPool,
    outbox_max_retries: i32,
}

impl ShipmentService {
    pub fn new(pool: PgPool, outbox_max_retries: i32) -> Self {
        Self {
            pool,
            outbox_max_retries,
        }
    }

    async fn enqueue(
        &self,
        conn: &mut PgConnection,
        platform: Platform,
        recipient: &str,
        message_type: &str,
        content: &OutboundContent,
        station_id: Option<StationId>,
    ) -> DispatchResult<()> {
        outbox::enqueue(
            conn,
            platform,
            recipient,
            message_type,
            content,
            station_id,
            self.outbox_max_retries,
        )
        .await?;
        Ok(())
    }

    /// Creates an OPEN shipment, confirming to the sender and broadcasting
    /// to couriers in the same transaction.
    pub async fn create(&self, request: NewShipmentRequest) -> DispatchResult<Delivery> {
        let pickup = validate_address(&request.pickup_address)?;
        let dropoff = validate_address(&request.dropoff_address)?;
        let fee = validate_amount(request.fee)?;
        if fee > MAX_FEE {
            return Err(DispatchError::AmountOutOfRange(fee));
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let sender = users::get_user(&mut tx, request.sender_id).await?;

        let delivery = deliveries::insert_delivery(
            &mut tx,
            &NewDelivery {
                token: generate_token(),
                sender_id: request.sender_id,
                station_id: request.station_id,
                pickup_address: pickup,
                pickup_contact_name: request.pickup_contact_name,
                pickup_contact_phone: request.pickup_contact_phone,
                dropoff_address: dropoff,
                dropoff_contact_name: request.dropoff_contact_name,
                dropoff_contact_phone: request.dropoff_contact_phone,
                fee,
                notes: request.notes,
            },
        )
        .await?;

        self.enqueue(
            &mut tx,
            sender.platform,
            &sender.chat_id,
            message_type::DELIVERY_CREATED,
            &notify::created_for_sender(&delivery),
            None,
        )
        .await?;
        self.enqueue(
            &mut tx,
            Platform::Bot,
            BROADCAST_COURIERS,
            message_type::DELIVERY_BROADCAST,
            &notify::broadcast_to_couriers(&delivery),
            delivery.station_id,
        )
        .await?;

        tx.commit().await.map_err(db_err)?;
        info!(delivery_id = delivery.id, sender_id = sender.id, "shipment created");
        Ok(delivery)
    }

    async fn lock_by_key(
        conn: &mut PgConnection,
        key: &CaptureKey,
    ) -> DispatchResult<Delivery> {
        match key {
            CaptureKey::Id(id) => deliveries::lock_delivery(conn, *id).await,
            CaptureKey::Token(token) => deliveries::lock_delivery_by_token(conn, token).await,
        }
    }

    /// Atomic direct capture of an OPEN shipment.
    ///
    /// Locks the delivery row, then the wallet row; enforces blacklist and
    /// credit limit; transitions to CAPTURED; appends the debit ledger row;
    /// credits the station commission; enqueues the sender notification.
    /// Any failure rolls all of it back.
    pub async fn capture(
        &self,
        key: CaptureKey,
        courier_id: UserId,
        fee_override: Option<Money>,
    ) -> DispatchResult<CaptureOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let delivery = Self::lock_by_key(&mut tx, &key).await?;
        if delivery.status != DeliveryStatus::Open {
            return Err(DispatchError::DeliveryNotAvailable {
                status: delivery.status.as_str().to_string(),
            });
        }

        let outcome = self
            .capture_locked(&mut tx, delivery, courier_id, fee_override)
            .await?;

        tx.commit().await.map_err(db_err)?;
        info!(
            delivery_id = outcome.delivery.id,
            courier_id,
            balance_after = %outcome.wallet.balance,
            "delivery captured"
        );
        Ok(outcome)
    }

    /// Shared tail of direct capture and dispatcher approval. Assumes the
    /// delivery row is already locked and status-checked.
    async fn capture_locked(
        &self,
        conn: &mut PgConnection,
        delivery: Delivery,
        courier_id: UserId,
        fee_override: Option<Money>,
    ) -> DispatchResult<CaptureOutcome> {
        if let Some(station_id) = delivery.station_id {
            if stations::is_blacklisted(conn, station_id, courier_id).await? {
                return Err(DispatchError::CourierBlacklisted {
                    courier_id,
                    station_id,
                });
            }
        }

        let fee = match fee_override {
            Some(f) => {
                let f = validate_amount(f)?;
                if f > MAX_FEE {
                    return Err(DispatchError::AmountOutOfRange(f));
                }
                f
            }
            None => delivery.fee,
        };

        let (wallet, _entry) = dp_03_wallet::engine::debit_for_capture(
            conn,
            courier_id,
            delivery.id,
            fee,
            "delivery fee",
        )
        .await?;

        let now = Utc::now();
        deliveries::apply_capture(conn, delivery.id, courier_id, fee, now).await?;

        let commission = match delivery.station_id {
            Some(station_id) => Some(
                dp_03_wallet::engine::credit_station_commission(conn, station_id, delivery.id, fee)
                    .await?,
            ),
            None => None,
        };

        let courier = users::get_user(conn, courier_id).await?;
        let sender = users::get_user(conn, delivery.sender_id).await?;
        self.enqueue(
            conn,
            sender.platform,
            &sender.chat_id,
            message_type::DELIVERY_CAPTURED,
            &notify::captured_for_sender(&delivery, &courier.display_name),
            None,
        )
        .await?;

        let delivery = Delivery {
            status: DeliveryStatus::Captured,
            courier_id: Some(courier_id),
            requesting_courier_id: None,
            fee,
            captured_at: Some(now),
            ..delivery
        };
        Ok(CaptureOutcome {
            delivery,
            wallet,
            commission,
        })
    }

    /// Two-step station flow: a courier requests a capture; the shipment
    /// waits for a dispatcher. Only OPEN station shipments qualify.
    pub async fn request_capture(
        &self,
        key: CaptureKey,
        courier_id: UserId,
    ) -> DispatchResult<Delivery> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let delivery = Self::lock_by_key(&mut tx, &key).await?;
        if delivery.status != DeliveryStatus::Open {
            return Err(DispatchError::DeliveryNotAvailable {
                status: delivery.status.as_str().to_string(),
            });
        }
        let station_id = delivery.station_id.ok_or_else(|| {
            DispatchError::ValidationError {
                field: "station_id".to_string(),
                reason: "approval flow requires a station shipment".to_string(),
            }
        })?;
        if stations::is_blacklisted(&mut tx, station_id, courier_id).await? {
            return Err(DispatchError::CourierBlacklisted {
                courier_id,
                station_id,
            });
        }

        deliveries::apply_capture_request(&mut tx, delivery.id, courier_id).await?;

        let courier = users::get_user(&mut tx, courier_id).await?;
        let station = stations::get_station(&mut tx, station_id).await?;
        if let Some(group_chat_id) = &station.group_chat_id {
            self.enqueue(
                &mut tx,
                Platform::Bot,
                group_chat_id,
                message_type::CAPTURE_REQUESTED,
                &notify::capture_requested_for_station(&delivery, &courier.display_name),
                Some(station_id),
            )
            .await?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(Delivery {
            status: DeliveryStatus::PendingApproval,
            requesting_courier_id: Some(courier_id),
            ..delivery
        })
    }

    /// Dispatcher approval: performs the capture debit against the
    /// requesting courier.
    pub async fn approve_capture(
        &self,
        delivery_id: DeliveryId,
        approver_id: UserId,
    ) -> DispatchResult<CaptureOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let delivery = deliveries::lock_delivery(&mut tx, delivery_id).await?;
        if delivery.status != DeliveryStatus::PendingApproval {
            return Err(DispatchError::DeliveryNotAvailable {
                status: delivery.status.as_str().to_string(),
            });
        }
        let courier_id = delivery.requesting_courier_id.ok_or_else(|| {
            DispatchError::Internal("pending approval without requesting courier".to_string())
        })?;

        let outcome = self
            .capture_locked(&mut tx, delivery, courier_id, None)
            .await?;

        let courier = users::get_user(&mut tx, courier_id).await?;
        self.enqueue(
            &mut tx,
            courier.platform,
            &courier.chat_id,
            message_type::DELIVERY_CAPTURED,
            &notify::approved_for_courier(&outcome.delivery),
            None,
        )
        .await?;

        tx.commit().await.map_err(db_err)?;
        info!(delivery_id, courier_id, approver_id, "capture approved");
        Ok(outcome)
    }

    /// Dispatcher rejection of a pending capture request.
    pub async fn reject_capture(
        &self,
        delivery_id: DeliveryId,
        approver_id: UserId,
    ) -> DispatchResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let delivery = deliveries::lock_delivery(&mut tx, delivery_id).await?;
        if delivery.status != DeliveryStatus::PendingApproval {
            return Err(DispatchError::InvalidStateTransition {
                from: delivery.status.as_str().to_string(),
                to: DeliveryStatus::Cancelled.as_str().to_string(),
            });
        }

        deliveries::apply_status(&mut tx, delivery_id, DeliveryStatus::Cancelled).await?;

        if let Some(courier_id) = delivery.requesting_courier_id {
            let courier = users::get_user(&mut tx, courier_id).await?;
            self.enqueue(
                &mut tx,
                courier.platform,
                &courier.chat_id,
                message_type::DELIVERY_CANCELLED,
                &notify::rejected_for_courier(),
                None,
            )
            .await?;
        }

        tx.commit().await.map_err(db_err)?;
        info!(delivery_id, approver_id, "capture rejected");
        Ok(())
    }

    /// CAPTURED → IN_PROGRESS, only by the assigned courier.
    pub async fn mark_picked_up(
        &self,
        delivery_id: DeliveryId,
        courier_id: UserId,
    ) -> DispatchResult<Delivery> {
        self.transition_by_courier(
            delivery_id,
            courier_id,
            DeliveryStatus::Captured,
            DeliveryStatus::InProgress,
        )
        .await
    }

    /// IN_PROGRESS → DELIVERED, only by the assigned courier.
    pub async fn mark_delivered(
        &self,
        delivery_id: DeliveryId,
        courier_id: UserId,
    ) -> DispatchResult<Delivery> {
        self.transition_by_courier(
            delivery_id,
            courier_id,
            DeliveryStatus::InProgress,
            DeliveryStatus::Delivered,
        )
        .await
    }

    async fn transition_by_courier(
        &self,
        delivery_id: DeliveryId,
        courier_id: UserId,
        expect: DeliveryStatus,
        target: DeliveryStatus,
    ) -> DispatchResult<Delivery> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let delivery = deliveries::lock_delivery(&mut tx, delivery_id).await?;
        if delivery.status != expect {
            return Err(DispatchError::InvalidStateTransition {
                from: delivery.status.as_str().to_string(),
                to: target.as_str().to_string(),
            });
        }
        if !delivery.is_assigned_to(courier_id) {
            warn!(delivery_id, courier_id, "transition by non-assigned courier rejected");
            return Err(DispatchError::NotAssignedCourier {
                delivery_id,
                courier_id,
            });
        }

        deliveries::apply_status(&mut tx, delivery_id, target).await?;

        let sender = users::get_user(&mut tx, delivery.sender_id).await?;
        let (message_type, content) = match target {
            DeliveryStatus::InProgress => (
                message_type::DELIVERY_PICKED_UP,
                notify::picked_up_for_sender(&delivery),
            ),
            DeliveryStatus::Delivered => (
                message_type::DELIVERY_DELIVERED,
                notify::delivered_for_sender(&delivery),
            ),
            _ => {
                return Err(DispatchError::Internal(format!(
                    "unexpected transition target {}",
                    target.as_str()
                )))
            }
        };
        self.enqueue(&mut tx, sender.platform, &sender.chat_id, message_type, &content, None)
            .await?;

        tx.commit().await.map_err(db_err)?;
        Ok(Delivery {
            status: target,
            ..delivery
        })
    }

    /// Cancellation: OPEN shipments by their sender (or an admin),
    /// PENDING_APPROVAL shipments by a station dispatcher.
    pub async fn cancel(
        &self,
        delivery_id: DeliveryId,
        actor_id: UserId,
        actor_role: Role,
        actor_is_dispatcher: bool,
    ) -> DispatchResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let delivery = deliveries::lock_delivery(&mut tx, delivery_id).await?;
        let allowed = match delivery.status {
            DeliveryStatus::Open => delivery.sender_id == actor_id || actor_role == Role::Admin,
            DeliveryStatus::PendingApproval => actor_is_dispatcher || actor_role == Role::Admin,
            _ => false,
        };
        if !allowed {
            return Err(DispatchError::InvalidStateTransition {
                from: delivery.status.as_str().to_string(),
                to: DeliveryStatus::Cancelled.as_str().to_string(),
            });
        }

        deliveries::apply_status(&mut tx, delivery_id, DeliveryStatus::Cancelled).await?;

        if let Some(courier_id) = delivery.requesting_courier_id {
            let courier = users::get_user(&mut tx, courier_id).await?;
            self.enqueue(
                &mut tx,
                courier.platform,
                &courier.chat_id,
                message_type::DELIVERY_CANCELLED,
                &notify::cancelled_for_courier(&delivery),
                None,
            )
            .await?;
        }

        tx.commit().await.map_err(db_err)?;
        info!(delivery_id, actor_id, "delivery cancelled");
        Ok(())
    }

    /// Read-only helpers for conversation menus.
    pub async fn open_deliveries(&self, limit: i64) -> DispatchResult<Vec<Delivery>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        deliveries::open_deliveries(&mut conn, limit).await
    }

    pub async fn active_for_courier(&self, courier_id: UserId) -> DispatchResult<Vec<Delivery>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        deliveries::active_for_courier(&mut conn, courier_id).await
    }

    pub async fn history_for_courier(
        &self,
        courier_id: UserId,
        limit: i64,
    ) -> DispatchResult<Vec<Delivery>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        deliveries::history_for_courier(&mut conn, courier_id, limit).await
    }

    pub async fn get_by_token(&self, token: &str) -> DispatchResult<Delivery> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        deliveries::get_delivery_by_token(&mut conn, token).await
    }
}
