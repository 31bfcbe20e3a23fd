//! # Error Types
//!
//! The platform error type shared across subsystems, with bit-stable numeric
//! codes in four ranges:
//!
//! | Range | Kind |
//! |-------|------|
//! | 1xxx  | Validation |
//! | 2xxx  | Not found |
//! | 3xxx  | Conflict / business |
//! | 4xxx  | Auth |
//! | 5xxx  | External / transient |
//! | 6xxx  | Internal |
//!
//! Validation and conflict errors surface to end users with a localized
//! (Hebrew) message and the stable code; tracebacks never do.

use rust_decimal::Decimal;
use thiserror::Error;

/// Platform-wide error type.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    // --- Validation (1xxx) ---
    /// Phone number failed validation.
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    /// Address failed validation (length or content).
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Name failed validation.
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Amount outside [0, 100000] or more than 2 decimal places.
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(Decimal),

    /// Input matched an injection pattern.
    #[error("Rejected input: matched pattern {pattern}")]
    InjectionDetected { pattern: String },

    /// Generic field validation failure.
    #[error("Validation error: {field}: {reason}")]
    ValidationError { field: String, reason: String },

    // --- Not found (2xxx) ---
    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Delivery not found")]
    DeliveryNotFound,

    #[error("Station not found: {0}")]
    StationNotFound(i64),

    #[error("Wallet not found for courier {0}")]
    WalletNotFound(i64),

    // --- Conflict / business (3xxx) ---
    /// A ledger row for this (courier, delivery, entry_type) already exists.
    #[error("Duplicate charge for delivery {delivery_id}")]
    DuplicateCharge { delivery_id: i64 },

    /// Debit would take the balance below the credit limit.
    #[error("Insufficient credit: balance {balance}, limit {credit_limit}, fee {fee}")]
    InsufficientCredit {
        balance: Decimal,
        credit_limit: Decimal,
        fee: Decimal,
    },

    /// Delivery exists but is not in a capturable state.
    #[error("Delivery not available (status {status})")]
    DeliveryNotAvailable { status: String },

    /// Transition outside the allowed set.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Courier is on the shipment's station blacklist.
    #[error("Courier {courier_id} is blacklisted by station {station_id}")]
    CourierBlacklisted { courier_id: i64, station_id: i64 },

    /// User already holds the station role being granted.
    #[error("User {user_id} already holds this station role")]
    AlreadyStationMember { user_id: i64 },

    /// Commission rate outside [0.06, 0.12].
    #[error("Commission rate {0} outside allowed range")]
    CommissionRateOutOfRange(Decimal),

    /// Pickup/deliver attempted by a courier the delivery is not assigned to.
    #[error("Delivery {delivery_id} is not assigned to courier {courier_id}")]
    NotAssignedCourier { delivery_id: i64, courier_id: i64 },

    // --- Auth (4xxx) ---
    #[error("Missing or invalid admin key")]
    InvalidAdminKey,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Wrong or expired one-time code")]
    WrongOtp,

    #[error("Rate limited; retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // --- External / transient (5xxx) ---
    /// Circuit breaker is open for the named service.
    #[error("Service unavailable: {service}")]
    ServiceUnavailable { service: String },

    #[error("Upstream timeout: {service}")]
    UpstreamTimeout { service: String },

    #[error("Upstream error {status} from {service}")]
    UpstreamError { service: String, status: u16 },

    // --- Internal (6xxx) ---
    /// Unexpected failure; logged with full context and correlation id.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// The bit-stable numeric code for this error.
    pub fn code(&self) -> u16 {
        match self {
            DispatchError::InvalidPhone(_) => 1001,
            DispatchError::InvalidAddress(_) => 1002,
            DispatchError::InvalidName(_) => 1003,
            DispatchError::AmountOutOfRange(_) => 1004,
            DispatchError::InjectionDetected { .. } => 1005,
            DispatchError::ValidationError { .. } => 1000,

            DispatchError::UserNotFound(_) => 2001,
            DispatchError::DeliveryNotFound => 2002,
            DispatchError::StationNotFound(_) => 2003,
            DispatchError::WalletNotFound(_) => 2004,

            DispatchError::DuplicateCharge { .. } => 3001,
            DispatchError::InsufficientCredit { .. } => 3002,
            DispatchError::DeliveryNotAvailable { .. } => 3003,
            DispatchError::InvalidStateTransition { .. } => 3004,
            DispatchError::CourierBlacklisted { .. } => 3005,
            DispatchError::AlreadyStationMember { .. } => 3006,
            DispatchError::CommissionRateOutOfRange(_) => 3007,
            DispatchError::NotAssignedCourier { .. } => 3008,

            DispatchError::InvalidAdminKey => 4001,
            DispatchError::InvalidToken => 4002,
            DispatchError::WrongOtp => 4003,
            DispatchError::RateLimited { .. } => 4004,

            DispatchError::ServiceUnavailable { .. } => 5001,
            DispatchError::UpstreamTimeout { .. } => 5002,
            DispatchError::UpstreamError { .. } => 5003,

            DispatchError::Internal(_) => 6000,
        }
    }

    /// Localized, end-user-safe message. Never includes internals.
    pub fn user_message(&self) -> String {
        match self {
            DispatchError::InvalidPhone(_) => "מספר הטלפון אינו תקין. נסו שוב.".to_string(),
            DispatchError::InvalidAddress(_) => "הכתובת אינה תקינה. נדרשות 5–200 תווים.".to_string(),
            DispatchError::InvalidName(_) => "השם אינו תקין. נסו שוב.".to_string(),
            DispatchError::AmountOutOfRange(_) => "הסכום אינו תקין.".to_string(),
            DispatchError::InjectionDetected { .. } | DispatchError::ValidationError { .. } => {
                "הקלט שהוזן אינו תקין.".to_string()
            }
            DispatchError::UserNotFound(_) => "המשתמש לא נמצא.".to_string(),
            DispatchError::DeliveryNotFound => "המשלוח לא נמצא.".to_string(),
            DispatchError::StationNotFound(_) => "התחנה לא נמצאה.".to_string(),
            DispatchError::WalletNotFound(_) => "הארנק לא נמצא.".to_string(),
            DispatchError::DuplicateCharge { .. } => "המשלוח כבר חויב.".to_string(),
            DispatchError::InsufficientCredit {
                balance,
                credit_limit,
                ..
            } => format!(
                "אין מספיק מסגרת אשראי. יתרה: {balance}, מסגרת: {credit_limit}."
            ),
            DispatchError::DeliveryNotAvailable { .. } => "המשלוח כבר נתפס.".to_string(),
            DispatchError::InvalidStateTransition { .. } => "הפעולה אינה אפשרית במצב הנוכחי.".to_string(),
            DispatchError::CourierBlacklisted { .. } => "אין אפשרות לתפוס משלוחים מתחנה זו.".to_string(),
            DispatchError::AlreadyStationMember { .. } => "המשתמש כבר רשום בתפקיד זה.".to_string(),
            DispatchError::CommissionRateOutOfRange(_) => "אחוז העמלה מחוץ לטווח המותר.".to_string(),
            DispatchError::NotAssignedCourier { .. } => "המשלוח אינו משויך אליך.".to_string(),
            DispatchError::InvalidAdminKey | DispatchError::InvalidToken => "אין הרשאה.".to_string(),
            DispatchError::WrongOtp => "קוד האימות שגוי או שפג תוקפו.".to_string(),
            DispatchError::RateLimited { .. } => "יותר מדי נסיונות. נסו שוב בעוד דקה.".to_string(),
            DispatchError::ServiceUnavailable { .. }
            | DispatchError::UpstreamTimeout { .. }
            | DispatchError::UpstreamError { .. } => "השירות אינו זמין כרגע. נסו שוב מאוחר יותר.".to_string(),
            DispatchError::Internal(_) => "אירעה שגיאה. נסו שוב מאוחר יותר.".to_string(),
        }
    }

    /// Transient errors are retried by the outbox; the rest are permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DispatchError::ServiceUnavailable { .. }
                | DispatchError::UpstreamTimeout { .. }
                | DispatchError::UpstreamError { .. }
        )
    }
}

/// Result alias used across subsystems.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_code_ranges() {
        assert_eq!(DispatchError::InvalidPhone("x".into()).code() / 1000, 1);
        assert_eq!(DispatchError::DeliveryNotFound.code() / 1000, 2);
        assert_eq!(
            DispatchError::DuplicateCharge { delivery_id: 7 }.code() / 1000,
            3
        );
        assert_eq!(DispatchError::WrongOtp.code() / 1000, 4);
        assert_eq!(
            DispatchError::ServiceUnavailable {
                service: "bot-api".into()
            }
            .code()
                / 1000,
            5
        );
        assert_eq!(DispatchError::Internal("x".into()).code() / 1000, 6);
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(DispatchError::DuplicateCharge { delivery_id: 1 }.code(), 3001);
        assert_eq!(
            DispatchError::InsufficientCredit {
                balance: dec!(-480),
                credit_limit: dec!(-500),
                fee: dec!(50),
            }
            .code(),
            3002
        );
        assert_eq!(
            DispatchError::DeliveryNotAvailable {
                status: "CAPTURED".into()
            }
            .code(),
            3003
        );
    }

    #[test]
    fn test_insufficient_credit_carries_details() {
        let err = DispatchError::InsufficientCredit {
            balance: dec!(-480),
            credit_limit: dec!(-500),
            fee: dec!(50),
        };
        let msg = err.to_string();
        assert!(msg.contains("-480"));
        assert!(msg.contains("-500"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn test_user_message_is_localized_and_sanitized() {
        let err = DispatchError::Internal("stack trace details".into());
        let msg = err.user_message();
        assert!(!msg.contains("stack"));
        assert!(!msg.is_empty());
    }

    #[test]
    fn test_transient_classification() {
        assert!(DispatchError::UpstreamTimeout {
            service: "webchat-user".into()
        }
        .is_transient());
        assert!(!DispatchError::DeliveryNotFound.is_transient());
        assert!(!DispatchError::DuplicateCharge { delivery_id: 1 }.is_transient());
    }
}
