//! Production `ConversationServices`: the façade wiring conversation
//! handlers to the shipment workflow, the wallet engine, and station
//! governance. Governance mutations write their audit row in the same
//! transaction.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use shared_types::{
    ApprovalStatus, CourierWallet, Delivery, DeliveryId, DeliveryStatus, DispatchResult, Money,
    OutboundContent, Platform, Role, Station, StationId, StationLedgerEntry, StationWallet, User,
    UserId, WalletLedgerEntry,
};
use sqlx::PgPool;

use dp_02_storage::users::CourierField;
use dp_02_storage::{db_err, deliveries, outbox, stations, users, wallets};
use dp_03_wallet::WalletService;
use dp_04_shipment::{CaptureKey, CaptureOutcome, NewShipmentRequest, ShipmentService};
use dp_05_conversation::{ClaimByToken, ConversationServices};

pub struct ProductionServices {
    pool: PgPool,
    shipments: ShipmentService,
    wallets: WalletService,
    admin_chat_id: Option<String>,
    outbox_max_retries: i32,
}

impl ProductionServices {
    pub fn new(
        pool: PgPool,
        shipments: ShipmentService,
        wallets: WalletService,
        admin_chat_id: Option<String>,
        outbox_max_retries: i32,
    ) -> Self {
        Self {
            pool,
            shipments,
            wallets,
            admin_chat_id,
            outbox_max_retries,
        }
    }

    async fn audit(
        &self,
        station_id: StationId,
        actor_id: UserId,
        action: &str,
        target_user_id: Option<UserId>,
    ) -> DispatchResult<()> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        stations::insert_audit(
            &mut conn,
            station_id,
            actor_id,
            action,
            target_user_id,
            None,
        )
        .await
    }
}

#[async_trait]
impl ConversationServices for ProductionServices {
    async fn set_display_name(&self, user_id: UserId, name: &str) -> DispatchResult<()> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        users::set_display_name(&mut conn, user_id, name).await
    }

    async fn set_role(&self, user_id: UserId, role: Role) -> DispatchResult<()> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        users::set_role(&mut conn, user_id, role).await
    }

    async fn set_approval_status(
        &self,
        user_id: UserId,
        status: ApprovalStatus,
    ) -> DispatchResult<()> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        users::set_approval_status(&mut conn, user_id, status).await
    }

    async fn set_courier_field(
        &self,
        user_id: UserId,
        field: CourierField,
        value: &str,
    ) -> DispatchResult<()> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        users::set_courier_field(&mut conn, user_id, field, value).await
    }

    async fn set_terms_accepted(&self, user_id: UserId) -> DispatchResult<()> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        users::set_terms_accepted(&mut conn, user_id, chrono::Utc::now()).await
    }

    async fn find_user_by_phone(&self, phone: &str) -> DispatchResult<Option<User>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        users::get_user_by_phone(&mut conn, phone).await
    }

    async fn create_shipment(&self, request: NewShipmentRequest) -> DispatchResult<Delivery> {
        self.shipments.create(request).await
    }

    async fn claim_by_token(
        &self,
        token: &str,
        courier_id: UserId,
    ) -> DispatchResult<ClaimByToken> {
        let delivery = self.shipments.get_by_token(token).await?;
        if delivery.station_id.is_some() {
            let pending = self
                .shipments
                .request_capture(CaptureKey::Token(token.to_string()), courier_id)
                .await?;
            Ok(ClaimByToken::PendingApproval(pending))
        } else {
            let outcome = self
                .shipments
                .capture(CaptureKey::Token(token.to_string()), courier_id, None)
                .await?;
            Ok(ClaimByToken::Captured(outcome))
        }
    }

    async fn approve_by_token(
        &self,
        token: &str,
        approver_id: UserId,
    ) -> DispatchResult<CaptureOutcome> {
        let delivery = self.shipments.get_by_token(token).await?;
        self.shipments.approve_capture(delivery.id, approver_id).await
    }

    async fn reject_by_token(&self, token: &str, approver_id: UserId) -> DispatchResult<()> {
        let delivery = self.shipments.get_by_token(token).await?;
        self.shipments.reject_capture(delivery.id, approver_id).await
    }

    async fn mark_picked_up(
        &self,
        delivery_id: DeliveryId,
        courier_id: UserId,
    ) -> DispatchResult<Delivery> {
        self.shipments.mark_picked_up(delivery_id, courier_id).await
    }

    async fn mark_delivered(
        &self,
        delivery_id: DeliveryId,
        courier_id: UserId,
    ) -> DispatchResult<Delivery> {
        self.shipments.mark_delivered(delivery_id, courier_id).await
    }

    async fn open_deliveries(&self, limit: i64) -> DispatchResult<Vec<Delivery>> {
        self.shipments.open_deliveries(limit).await
    }

    async fn active_for_courier(&self, courier_id: UserId) -> DispatchResult<Vec<Delivery>> {
        self.shipments.active_for_courier(courier_id).await
    }

    async fn history_for_courier(
        &self,
        courier_id: UserId,
        limit: i64,
    ) -> DispatchResult<Vec<Delivery>> {
        self.shipments.history_for_courier(courier_id, limit).await
    }

    async fn deliveries_for_sender(
        &self,
        sender_id: UserId,
        limit: i64,
    ) -> DispatchResult<Vec<Delivery>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        deliveries::deliveries_for_sender(&mut conn, sender_id, limit).await
    }

    async fn deliveries_for_station(
        &self,
        station_id: StationId,
        statuses: &[DeliveryStatus],
        limit: i64,
    ) -> DispatchResult<Vec<Delivery>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        deliveries::deliveries_for_station(&mut conn, station_id, statuses, limit).await
    }

    async fn wallet(&self, courier_id: UserId) -> DispatchResult<CourierWallet> {
        self.wallets.get_or_create(courier_id).await
    }

    async fn wallet_history(
        &self,
        courier_id: UserId,
        limit: i64,
    ) -> DispatchResult<Vec<WalletLedgerEntry>> {
        self.wallets.history(courier_id, limit).await
    }

    async fn manual_charge(
        &self,
        station_id: StationId,
        courier_id: UserId,
        charged_by: UserId,
        amount: Money,
        reason: &str,
    ) -> DispatchResult<CourierWallet> {
        let wallet = self
            .wallets
            .manual_charge(station_id, courier_id, charged_by, amount, reason)
            .await?;
        self.audit(station_id, charged_by, "manual_charge", Some(courier_id))
            .await?;
        Ok(wallet)
    }

    async fn station_wallet(&self, station_id: StationId) -> DispatchResult<StationWallet> {
        self.wallets.station_wallet(station_id).await
    }

    async fn station_ledger(
        &self,
        station_id: StationId,
        limit: i64,
    ) -> DispatchResult<Vec<StationLedgerEntry>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        wallets::station_ledger_history(&mut conn, station_id, limit).await
    }

    async fn set_commission_rate(
        &self,
        station_id: StationId,
        rate: Decimal,
    ) -> DispatchResult<()> {
        self.wallets.set_commission_rate(station_id, rate).await
    }

    async fn station_for_owner(&self, user_id: UserId) -> DispatchResult<Option<Station>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        stations::station_for_owner(&mut conn, user_id).await
    }

    async fn station_for_dispatcher(&self, user_id: UserId) -> DispatchResult<Option<Station>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        stations::station_for_dispatcher(&mut conn, user_id).await
    }

    async fn add_dispatcher(
        &self,
        station_id: StationId,
        user_id: UserId,
        actor_id: UserId,
    ) -> DispatchResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        stations::add_dispatcher(&mut tx, station_id, user_id).await?;
        stations::insert_audit(
            &mut tx,
            station_id,
            actor_id,
            "add_dispatcher",
            Some(user_id),
            None,
        )
        .await?;
        tx.commit().await.map_err(db_err)
    }

    async fn remove_dispatcher(
        &self,
        station_id: StationId,
        user_id: UserId,
        actor_id: UserId,
    ) -> DispatchResult<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let removed = stations::remove_dispatcher(&mut tx, station_id, user_id).await?;
        if removed {
            stations::insert_audit(
                &mut tx,
                station_id,
                actor_id,
                "remove_dispatcher",
                Some(user_id),
                None,
            )
            .await?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(removed)
    }

    async fn add_owner(
        &self,
        station_id: StationId,
        user_id: UserId,
        actor_id: UserId,
    ) -> DispatchResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        stations::add_owner(&mut tx, station_id, user_id).await?;
        stations::insert_audit(&mut tx, station_id, actor_id, "add_owner", Some(user_id), None)
            .await?;
        tx.commit().await.map_err(db_err)
    }

    async fn remove_owner(
        &self,
        station_id: StationId,
        user_id: UserId,
        actor_id: UserId,
    ) -> DispatchResult<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let removed = stations::remove_owner(&mut tx, station_id, user_id).await?;
        if removed {
            stations::insert_audit(
                &mut tx,
                station_id,
                actor_id,
                "remove_owner",
                Some(user_id),
                None,
            )
            .await?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(removed)
    }

    async fn add_to_blacklist(
        &self,
        station_id: StationId,
        courier_id: UserId,
        actor_id: UserId,
    ) -> DispatchResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        stations::add_to_blacklist(&mut tx, station_id, courier_id).await?;
        stations::insert_audit(
            &mut tx,
            station_id,
            actor_id,
            "blacklist_add",
            Some(courier_id),
            Some(json!({ "courier_id": courier_id })),
        )
        .await?;
        tx.commit().await.map_err(db_err)
    }

    async fn remove_from_blacklist(
        &self,
        station_id: StationId,
        courier_id: UserId,
        actor_id: UserId,
    ) -> DispatchResult<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let removed = stations::remove_from_blacklist(&mut tx, station_id, courier_id).await?;
        if removed {
            stations::insert_audit(
                &mut tx,
                station_id,
                actor_id,
                "blacklist_remove",
                Some(courier_id),
                None,
            )
            .await?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(removed)
    }

    async fn set_station_group(
        &self,
        station_id: StationId,
        group_chat_id: &str,
    ) -> DispatchResult<()> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        stations::set_group_chat(&mut conn, station_id, group_chat_id).await
    }

    async fn notify_admins(&self, text: &str) -> DispatchResult<()> {
        let Some(chat_id) = &self.admin_chat_id else {
            tracing::warn!("admin notification dropped: ADMIN_CHAT_ID not configured");
            return Ok(());
        };
        // Numeric ids (including group ids) live on the bot platform;
        // anything else goes through the web-chat admin channel.
        let platform = if chat_id.chars().all(|c| c.is_ascii_digit() || c == '-') {
            Platform::Bot
        } else {
            Platform::WebChat
        };
        let content = OutboundContent {
            text: text.to_string(),
            keyboard: None,
            media: None,
        };
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        outbox::enqueue(
            &mut conn,
            platform,
            chat_id,
            "admin_notice",
            &content,
            None,
            self.outbox_max_retries,
        )
        .await?;
        Ok(())
    }
}
