//! # Validation & Sanitization
//!
//! Every user-supplied field accepted by the core must pass the matching
//! validator here before it touches the store; violations fail with a 1xxx
//! validation error. Rejection happens at the gate, before any business
//! logic runs.
//!
//! ## Components
//!
//! - **Phone**: Israeli phone validation, canonical `+972…` normalization,
//!   masking for logs, deterministic `tg:` placeholders.
//! - **Address / Name / Amount**: field validators with normalization.
//! - **TextSanitizer**: whitespace/null-byte cleanup, HTML escaping, and
//!   SQL/XSS injection scanning.

pub mod address;
pub mod amount;
pub mod name;
pub mod phone;
pub mod sanitize;

pub use address::{normalize_address, validate_address};
pub use amount::validate_amount;
pub use name::validate_name;
pub use phone::{mask_phone, normalize_phone, phone_placeholder, validate_phone};
pub use sanitize::{check_for_injection, sanitize, sanitize_for_html};
