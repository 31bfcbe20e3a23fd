//! Driving and driven ports of the conversation engine.
//!
//! Handlers touch persistent state only through these traits, so every flow
//! runs unchanged against the Postgres adapters in production and the
//! in-memory adapters in tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use shared_types::{
    ApprovalStatus, ConversationSession, CourierWallet, Delivery, DeliveryId, DeliveryStatus,
    DispatchResult, Money, Platform, Role, Station, StationId, StationLedgerEntry, StationWallet,
    User, UserId, WalletLedgerEntry,
};

use dp_02_storage::users::CourierField;
use dp_04_shipment::{CaptureOutcome, NewShipmentRequest};

/// Result of a courier claiming a shipment by its smart-link token.
#[derive(Debug, Clone)]
pub enum ClaimByToken {
    /// Captured directly; the wallet was debited.
    Captured(CaptureOutcome),
    /// Station shipment: now PENDING_APPROVAL, waiting for a dispatcher.
    PendingApproval(Delivery),
}

/// Session persistence for the engine.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_or_create(
        &self,
        user_id: UserId,
        platform: Platform,
    ) -> DispatchResult<ConversationSession>;

    /// Persists the state plus the full (already merged) context map.
    async fn save(
        &self,
        user_id: UserId,
        platform: Platform,
        state: &str,
        context: &Map<String, Value>,
    ) -> DispatchResult<()>;

    /// Back to INITIAL with an empty context.
    async fn reset(&self, user_id: UserId, platform: Platform) -> DispatchResult<()>;
}

/// Business operations reachable from conversation handlers. Production
/// wires this to the shipment, wallet, and station services; tests provide
/// an in-memory double.
#[async_trait]
pub trait ConversationServices: Send + Sync {
    // --- users ---
    async fn set_display_name(&self, user_id: UserId, name: &str) -> DispatchResult<()>;
    async fn set_role(&self, user_id: UserId, role: Role) -> DispatchResult<()>;
    async fn set_approval_status(
        &self,
        user_id: UserId,
        status: ApprovalStatus,
    ) -> DispatchResult<()>;
    async fn set_courier_field(
        &self,
        user_id: UserId,
        field: CourierField,
        value: &str,
    ) -> DispatchResult<()>;
    async fn set_terms_accepted(&self, user_id: UserId) -> DispatchResult<()>;
    async fn find_user_by_phone(&self, phone: &str) -> DispatchResult<Option<User>>;

    // --- shipments ---
    async fn create_shipment(&self, request: NewShipmentRequest) -> DispatchResult<Delivery>;
    /// Courier pressed a capture button. Station-routed shipments enter the
    /// two-step approval flow; the rest capture directly.
    async fn claim_by_token(
        &self,
        token: &str,
        courier_id: UserId,
    ) -> DispatchResult<ClaimByToken>;
    async fn approve_by_token(
        &self,
        token: &str,
        approver_id: UserId,
    ) -> DispatchResult<CaptureOutcome>;
    async fn reject_by_token(&self, token: &str, approver_id: UserId) -> DispatchResult<()>;
    async fn mark_picked_up(
        &self,
        delivery_id: DeliveryId,
        courier_id: UserId,
    ) -> DispatchResult<Delivery>;
    async fn mark_delivered(
        &self,
        delivery_id: DeliveryId,
        courier_id: UserId,
    ) -> DispatchResult<Delivery>;
    async fn open_deliveries(&self, limit: i64) -> DispatchResult<Vec<Delivery>>;
    async fn active_for_courier(&self, courier_id: UserId) -> DispatchResult<Vec<Delivery>>;
    async fn history_for_courier(
        &self,
        courier_id: UserId,
        limit: i64,
    ) -> DispatchResult<Vec<Delivery>>;
    async fn deliveries_for_sender(
        &self,
        sender_id: UserId,
        limit: i64,
    ) -> DispatchResult<Vec<Delivery>>;
    async fn deliveries_for_station(
        &self,
        station_id: StationId,
        statuses: &[DeliveryStatus],
        limit: i64,
    ) -> DispatchResult<Vec<Delivery>>;

    // --- wallets ---
    async fn wallet(&self, courier_id: UserId) -> DispatchResult<CourierWallet>;
    async fn wallet_history(
        &self,
        courier_id: UserId,
        limit: i64,
    ) -> DispatchResult<Vec<WalletLedgerEntry>>;
    async fn manual_charge(
        &self,
        station_id: StationId,
        courier_id: UserId,
        charged_by: UserId,
        amount: Money,
        reason: &str,
    ) -> DispatchResult<CourierWallet>;
    async fn station_wallet(&self, station_id: StationId) -> DispatchResult<StationWallet>;
    async fn station_ledger(
        &self,
        station_id: StationId,
        limit: i64,
    ) -> DispatchResult<Vec<StationLedgerEntry>>;
    async fn set_commission_rate(
        &self,
        station_id: StationId,
        rate: Decimal,
    ) -> DispatchResult<()>;

    // --- station governance ---
    async fn station_for_owner(&self, user_id: UserId) -> DispatchResult<Option<Station>>;
    async fn station_for_dispatcher(&self, user_id: UserId) -> DispatchResult<Option<Station>>;
    async fn add_dispatcher(
        &self,
        station_id: StationId,
        user_id: UserId,
        actor_id: UserId,
    ) -> DispatchResult<()>;
    async fn remove_dispatcher(
        &self,
        station_id: StationId,
        user_id: UserId,
        actor_id: UserId,
    ) -> DispatchResult<bool>;
    async fn add_owner(
        &self,
        station_id: StationId,
        user_id: UserId,
        actor_id: UserId,
    ) -> DispatchResult<()>;
    async fn remove_owner(
        &self,
        station_id: StationId,
        user_id: UserId,
        actor_id: UserId,
    ) -> DispatchResult<bool>;
    async fn add_to_blacklist(
        &self,
        station_id: StationId,
        courier_id: UserId,
        actor_id: UserId,
    ) -> DispatchResult<()>;
    async fn remove_from_blacklist(
        &self,
        station_id: StationId,
        courier_id: UserId,
        actor_id: UserId,
    ) -> DispatchResult<bool>;
    async fn set_station_group(
        &self,
        station_id: StationId,
        group_chat_id: &str,
    ) -> DispatchResult<()>;

    // --- out-of-band notifications (deposit requests, onboarding alerts) ---
    async fn notify_admins(&self, text: &str) -> DispatchResult<()>;
}
