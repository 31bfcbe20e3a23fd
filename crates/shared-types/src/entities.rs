//! # Core Domain Entities
//!
//! Defines the core dispatch entities shared across subsystems.
//!
//! ## Clusters
//!
//! - **Identity**: `User`, `Role`, `Platform`, `ApprovalStatus`
//! - **Shipments**: `Delivery`, `DeliveryStatus`
//! - **Wallets**: `CourierWallet`, `WalletLedgerEntry`, `StationWallet`, `StationLedgerEntry`
//! - **Conversation**: `ConversationSession`
//! - **Delivery pipeline**: `OutboxMessage`, `OutboxStatus`, `WebhookEvent`
//! - **Station governance**: `Station`, `AuditLogEntry`, `ManualCharge`

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Stable user identifier. Must hold Telegram-scale (64-bit) identities.
pub type UserId = i64;

/// Delivery identifier.
pub type DeliveryId = i64;

/// Station identifier.
pub type StationId = i64;

/// Sentinel recipient meaning "fan out to all active approved couriers".
pub const BROADCAST_COURIERS: &str = "BROADCAST_COURIERS";

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// End-user role. Every role-switch site must handle all variants explicitly;
/// there is no generic fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Sender,
    Courier,
    Admin,
    StationOwner,
}

impl Role {
    /// Canonical storage form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Sender => "SENDER",
            Role::Courier => "COURIER",
            Role::Admin => "ADMIN",
            Role::StationOwner => "STATION_OWNER",
        }
    }

    /// Parses the canonical storage form.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "SENDER" => Some(Role::Sender),
            "COURIER" => Some(Role::Courier),
            "ADMIN" => Some(Role::Admin),
            "STATION_OWNER" => Some(Role::StationOwner),
            _ => None,
        }
    }
}

/// Chat platform a user converses through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Bot-API platform (Telegram-style updates).
    Bot,
    /// Web-chat gateway.
    WebChat,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Bot => "bot",
            Platform::WebChat => "webchat",
        }
    }

    pub fn parse(s: &str) -> Option<Platform> {
        match s {
            "bot" => Some(Platform::Bot),
            "webchat" => Some(Platform::WebChat),
            _ => None,
        }
    }
}

/// Courier onboarding approval state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Blocked,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<ApprovalStatus> {
        match s {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            "blocked" => Some(ApprovalStatus::Blocked),
            _ => None,
        }
    }
}

/// A platform user. Created lazily on first inbound message, never
/// hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Canonical `+972…` phone, or a deterministic `tg:` placeholder when
    /// the platform never exposed one.
    pub phone: String,
    pub chat_id: String,
    pub display_name: String,
    pub role: Role,
    pub platform: Platform,
    pub is_active: bool,
    /// Courier-only onboarding fields.
    pub approval_status: Option<ApprovalStatus>,
    pub full_name: Option<String>,
    pub id_document_ref: Option<String>,
    pub selfie_ref: Option<String>,
    pub vehicle_photo_ref: Option<String>,
    pub vehicle_category: Option<String>,
    pub service_area: Option<String>,
    pub terms_accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// An approved, active courier may see broadcasts and capture deliveries.
    pub fn is_approved_courier(&self) -> bool {
        self.role == Role::Courier
            && self.is_active
            && self.approval_status == Some(ApprovalStatus::Approved)
    }
}

// =============================================================================
// CLUSTER B: SHIPMENTS
// =============================================================================

/// Delivery lifecycle status.
///
/// State machine:
/// ```text
/// OPEN ──(station-routed)──► PENDING_APPROVAL ──(approve)──► CAPTURED
/// OPEN ──(direct capture)─────────────────────────────────► CAPTURED
/// OPEN ──(sender/admin cancel)──► CANCELLED
/// PENDING_APPROVAL ──(reject)──► CANCELLED
/// CAPTURED ──(pickup)──► IN_PROGRESS ──(deliver)──► DELIVERED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Open,
    PendingApproval,
    Captured,
    InProgress,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Open => "OPEN",
            DeliveryStatus::PendingApproval => "PENDING_APPROVAL",
            DeliveryStatus::Captured => "CAPTURED",
            DeliveryStatus::InProgress => "IN_PROGRESS",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<DeliveryStatus> {
        match s {
            "OPEN" => Some(DeliveryStatus::Open),
            "PENDING_APPROVAL" => Some(DeliveryStatus::PendingApproval),
            "CAPTURED" => Some(DeliveryStatus::Captured),
            "IN_PROGRESS" => Some(DeliveryStatus::InProgress),
            "DELIVERED" => Some(DeliveryStatus::Delivered),
            "CANCELLED" => Some(DeliveryStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether `self → to` belongs to the allowed transition set.
    ///
    /// Transitions outside this set are rejected with
    /// `INVALID_STATE_TRANSITION`; DELIVERED and CANCELLED are terminal.
    pub fn can_transition(&self, to: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, to),
            (Open, PendingApproval)
                | (Open, Captured)
                | (Open, Cancelled)
                | (PendingApproval, Captured)
                | (PendingApproval, Cancelled)
                | (Captured, InProgress)
                | (InProgress, Delivered)
        )
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }
}

/// A shipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    /// URL-safe cryptographically random capture token (16 random bytes,
    /// base64url). Unique and mandatory; used for smart-link capture so
    /// sequential ids are never exposed.
    pub token: String,
    pub sender_id: UserId,
    pub courier_id: Option<UserId>,
    pub station_id: Option<StationId>,
    /// Set while a two-step station capture awaits dispatcher approval.
    pub requesting_courier_id: Option<UserId>,
    pub pickup_address: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub pickup_contact_name: Option<String>,
    pub pickup_contact_phone: Option<String>,
    pub dropoff_address: String,
    pub dropoff_lat: Option<f64>,
    pub dropoff_lng: Option<f64>,
    pub dropoff_contact_name: Option<String>,
    pub dropoff_contact_phone: Option<String>,
    pub status: DeliveryStatus,
    /// 0 ≤ fee ≤ 10 000, NUMERIC(10,2).
    pub fee: Money,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub captured_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Delivery {
    /// True while the delivery can still be captured directly.
    pub fn is_open(&self) -> bool {
        self.status == DeliveryStatus::Open
    }

    /// Authorization guard for pickup/deliver transitions.
    pub fn is_assigned_to(&self, courier_id: UserId) -> bool {
        self.courier_id == Some(courier_id)
    }
}

// =============================================================================
// CLUSTER C: WALLETS
// =============================================================================

/// A courier's wallet. Negative balance is debt; after any debit the
/// balance must remain ≥ `credit_limit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierWallet {
    pub courier_id: UserId,
    pub balance: Money,
    /// Always ≤ 0; default −500.
    pub credit_limit: Money,
    pub updated_at: DateTime<Utc>,
}

impl CourierWallet {
    /// Pure credit check: would `balance − fee` still honor the limit?
    pub fn can_debit(&self, fee: Money) -> bool {
        self.balance - fee >= self.credit_limit
    }
}

/// Ledger entry kind. The (courier_id, delivery_id, entry_type) triple is
/// unique, which is the last-line defense against double-debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    DeliveryFeeDebit,
    Payment,
    Bonus,
    Refund,
    Adjustment,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::DeliveryFeeDebit => "delivery_fee_debit",
            LedgerEntryType::Payment => "payment",
            LedgerEntryType::Bonus => "bonus",
            LedgerEntryType::Refund => "refund",
            LedgerEntryType::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<LedgerEntryType> {
        match s {
            "delivery_fee_debit" => Some(LedgerEntryType::DeliveryFeeDebit),
            "payment" => Some(LedgerEntryType::Payment),
            "bonus" => Some(LedgerEntryType::Bonus),
            "refund" => Some(LedgerEntryType::Refund),
            "adjustment" => Some(LedgerEntryType::Adjustment),
            _ => None,
        }
    }
}

/// Append-only wallet ledger row. Immutable once written; the source of
/// truth for balance history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletLedgerEntry {
    pub id: i64,
    pub courier_id: UserId,
    pub delivery_id: Option<DeliveryId>,
    pub entry_type: LedgerEntryType,
    /// Signed: debits negative, credits positive.
    pub amount: Money,
    /// Wallet balance immediately after this row's application.
    pub balance_after: Money,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A station's income wallet. `commission_rate` is constrained to
/// [0.06, 0.12] both in code and by a DB CHECK constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationWallet {
    pub station_id: StationId,
    pub balance: Money,
    pub commission_rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Append-only station ledger row; unique on
/// (station_id, delivery_id, entry_type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationLedgerEntry {
    pub id: i64,
    pub station_id: StationId,
    pub delivery_id: Option<DeliveryId>,
    pub entry_type: LedgerEntryType,
    pub amount: Money,
    pub balance_after: Money,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Inclusive commission bounds for station wallets.
pub const COMMISSION_RATE_MIN: Decimal = Decimal::from_parts(6, 0, 0, false, 2);
pub const COMMISSION_RATE_MAX: Decimal = Decimal::from_parts(12, 0, 0, false, 2);

// =============================================================================
// CLUSTER D: CONVERSATION
// =============================================================================

/// Per-(user, platform) conversation state. Created on first inbound
/// message, mutated on every transition, destroyed by explicit reset only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub user_id: UserId,
    pub platform: Platform,
    /// Dotted state identifier, e.g. `SENDER.REGISTER.COLLECT_NAME`.
    pub current_state: String,
    /// Semi-structured flow context; merged copy-on-write.
    pub context_data: serde_json::Map<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

// =============================================================================
// CLUSTER E: DELIVERY PIPELINE
// =============================================================================

/// Outbox queue row status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Sent,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Processing => "processing",
            OutboxStatus::Sent => "sent",
            OutboxStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<OutboxStatus> {
        match s {
            "pending" => Some(OutboxStatus::Pending),
            "processing" => Some(OutboxStatus::Processing),
            "sent" => Some(OutboxStatus::Sent),
            "failed" => Some(OutboxStatus::Failed),
            _ => None,
        }
    }
}

/// Structured outbound payload carried by an outbox row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundContent {
    /// HTML-subset text; converted to the target platform's markup at the
    /// adapter boundary.
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<Keyboard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
}

/// A reply keyboard: rows of button labels. Converted to inline buttons on
/// the bot platform and enumerated plain-text options on web-chat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<String>>,
}

impl Keyboard {
    pub fn single_column(labels: &[&str]) -> Self {
        Self {
            rows: labels.iter().map(|l| vec![(*l).to_string()]).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.is_empty())
    }
}

/// Media attachment descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    /// `photo` or `document`.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Durable outbound-notification queue row, written in the same transaction
/// as the business change that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: i64,
    pub platform: Platform,
    /// A chat id, or the `BROADCAST_COURIERS` sentinel.
    pub recipient_id: String,
    pub message_type: String,
    pub content: OutboundContent,
    /// Station scope for broadcast blacklist filtering.
    pub station_id: Option<StationId>,
    pub status: OutboxStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    /// Correlation ID of the request that enqueued the row. Workers
    /// re-enter its scope on send, so the whole logical operation shares
    /// one ID across the enqueue/drain boundary.
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Inbound idempotency ledger status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Received,
    Processing,
    Processed,
    Failed,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookStatus::Received => "received",
            WebhookStatus::Processing => "processing",
            WebhookStatus::Processed => "processed",
            WebhookStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<WebhookStatus> {
        match s {
            "received" => Some(WebhookStatus::Received),
            "processing" => Some(WebhookStatus::Processing),
            "processed" => Some(WebhookStatus::Processed),
            "failed" => Some(WebhookStatus::Failed),
            _ => None,
        }
    }
}

/// Seconds after which a `processing` webhook event is considered stale and
/// may be reclaimed.
pub const WEBHOOK_STALE_AFTER_SECS: i64 = 120;

/// Idempotency ledger row keyed on the platform message id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: i64,
    pub platform_message_id: String,
    pub status: WebhookStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// CLUSTER F: STATION GOVERNANCE
// =============================================================================

/// A dispatch station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub group_chat_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Station audit trail row; indexed (station_id, created_at DESC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub station_id: StationId,
    pub actor_user_id: UserId,
    pub action: String,
    pub target_user_id: Option<UserId>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A dispatcher-initiated manual wallet charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualCharge {
    pub id: i64,
    pub station_id: StationId,
    pub courier_id: UserId,
    pub charged_by: UserId,
    pub amount: Money,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_allowed_delivery_transitions() {
        use DeliveryStatus::*;
        assert!(Open.can_transition(Captured));
        assert!(Open.can_transition(PendingApproval));
        assert!(Open.can_transition(Cancelled));
        assert!(PendingApproval.can_transition(Captured));
        assert!(PendingApproval.can_transition(Cancelled));
        assert!(Captured.can_transition(InProgress));
        assert!(InProgress.can_transition(Delivered));
    }

    #[test]
    fn test_rejected_delivery_transitions() {
        use DeliveryStatus::*;
        assert!(!Open.can_transition(InProgress));
        assert!(!Open.can_transition(Delivered));
        assert!(!Captured.can_transition(Delivered));
        assert!(!Captured.can_transition(Open));
        assert!(!Delivered.can_transition(Cancelled));
        assert!(!Cancelled.can_transition(Open));
        assert!(!InProgress.can_transition(Captured));
    }

    #[test]
    fn test_terminal_states() {
        assert!(DeliveryStatus::Delivered.is_terminal());
        assert!(DeliveryStatus::Cancelled.is_terminal());
        assert!(!DeliveryStatus::Open.is_terminal());
        assert!(!DeliveryStatus::Captured.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            DeliveryStatus::Open,
            DeliveryStatus::PendingApproval,
            DeliveryStatus::Captured,
            DeliveryStatus::InProgress,
            DeliveryStatus::Delivered,
            DeliveryStatus::Cancelled,
        ] {
            assert_eq!(DeliveryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DeliveryStatus::parse("SHIPPED"), None);
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Sender, Role::Courier, Role::Admin, Role::StationOwner] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("MANAGER"), None);
    }

    #[test]
    fn test_wallet_can_debit() {
        let wallet = CourierWallet {
            courier_id: 99,
            balance: dec!(-100),
            credit_limit: dec!(-500),
            updated_at: Utc::now(),
        };
        assert!(wallet.can_debit(dec!(25)));
        assert!(wallet.can_debit(dec!(400)));
        assert!(!wallet.can_debit(dec!(400.01)));
    }

    #[test]
    fn test_wallet_debit_at_exact_limit() {
        let wallet = CourierWallet {
            courier_id: 99,
            balance: dec!(-480),
            credit_limit: dec!(-500),
            updated_at: Utc::now(),
        };
        assert!(wallet.can_debit(dec!(20)));
        assert!(!wallet.can_debit(dec!(50)));
    }

    #[test]
    fn test_ledger_entry_type_round_trip() {
        for t in [
            LedgerEntryType::DeliveryFeeDebit,
            LedgerEntryType::Payment,
            LedgerEntryType::Bonus,
            LedgerEntryType::Refund,
            LedgerEntryType::Adjustment,
        ] {
            assert_eq!(LedgerEntryType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_keyboard_single_column() {
        let kb = Keyboard::single_column(&["a", "b"]);
        assert_eq!(kb.rows.len(), 2);
        assert_eq!(kb.rows[0], vec!["a".to_string()]);
        assert!(!kb.is_empty());
        assert!(Keyboard::default().is_empty());
    }

    #[test]
    fn test_approved_courier_guard() {
        let mut user = User {
            id: 1,
            phone: "tg:1".into(),
            chat_id: "1".into(),
            display_name: "c".into(),
            role: Role::Courier,
            platform: Platform::Bot,
            is_active: true,
            approval_status: Some(ApprovalStatus::Approved),
            full_name: None,
            id_document_ref: None,
            selfie_ref: None,
            vehicle_photo_ref: None,
            vehicle_category: None,
            service_area: None,
            terms_accepted_at: None,
            created_at: Utc::now(),
        };
        assert!(user.is_approved_courier());
        user.approval_status = Some(ApprovalStatus::Pending);
        assert!(!user.is_approved_courier());
        user.approval_status = Some(ApprovalStatus::Approved);
        user.is_active = false;
        assert!(!user.is_approved_courier());
    }
}
