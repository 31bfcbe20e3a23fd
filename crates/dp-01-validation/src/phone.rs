//! Israeli phone number validation, normalization, masking, and
//! deterministic placeholders for users the platform never exposed a phone
//! for.
//!
//! Accepted input forms (spaces and dashes allowed anywhere):
//! - `0XXXXXXXXX` (local)
//! - `972XXXXXXXXX`
//! - `+972XXXXXXXXX`
//!
//! The canonical form is always `+972` followed by the national number
//! without its leading zero.

use sha1::{Digest, Sha1};
use shared_types::{DispatchError, DispatchResult};

/// Maximum length for a `tg:<chat_id>` placeholder before hashing kicks in.
const PLACEHOLDER_MAX: usize = 20;

fn strip_separators(s: &str) -> String {
    s.chars().filter(|c| !matches!(c, ' ' | '-')).collect()
}

/// Extracts the national significant number (without leading zero), or None
/// when the input is not an Israeli phone number.
fn national_number(s: &str) -> Option<String> {
    let stripped = strip_separators(s);

    let rest = if let Some(r) = stripped.strip_prefix("+972") {
        r.strip_prefix('0').unwrap_or(r).to_string()
    } else if let Some(r) = stripped.strip_prefix("972") {
        r.strip_prefix('0').unwrap_or(r).to_string()
    } else if let Some(r) = stripped.strip_prefix('0') {
        r.to_string()
    } else {
        return None;
    };

    if !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    // Landlines are 8 digits, mobiles 9, after the leading zero is dropped.
    if rest.len() != 8 && rest.len() != 9 {
        return None;
    }
    Some(rest)
}

/// Returns true when `s` is an acceptable Israeli phone number.
pub fn validate_phone(s: &str) -> bool {
    national_number(s).is_some()
}

/// Normalizes to the canonical `+972…` form.
///
/// Idempotent: normalizing an already-canonical number returns it unchanged.
pub fn normalize_phone(s: &str) -> DispatchResult<String> {
    match national_number(s) {
        Some(national) => Ok(format!("+972{national}")),
        None => Err(DispatchError::InvalidPhone(s.to_string())),
    }
}

/// Masks a phone for logging: canonical prefix with the last 4 digits
/// replaced by `*`. Placeholders and unparseable values are masked wholesale
/// rather than leaked.
pub fn mask_phone(s: &str) -> String {
    match normalize_phone(s) {
        Ok(canonical) => {
            let keep = canonical.len().saturating_sub(4);
            format!("{}****", &canonical[..keep])
        }
        Err(_) => {
            // Not a phone (placeholder, group id). Keep a short prefix only.
            let prefix: String = s.chars().take(4).collect();
            format!("{prefix}****")
        }
    }
}

/// Deterministic placeholder phone for bot users who never shared a number:
/// `tg:<chat_id>` when it fits 20 chars, otherwise `tg:` plus the first
/// 17 hex chars of SHA-1(chat_id).
pub fn phone_placeholder(chat_id: &str) -> DispatchResult<String> {
    if chat_id.is_empty() {
        return Err(DispatchError::ValidationError {
            field: "chat_id".to_string(),
            reason: "empty".to_string(),
        });
    }

    let direct = format!("tg:{chat_id}");
    if direct.len() <= PLACEHOLDER_MAX {
        return Ok(direct);
    }

    let digest = Sha1::digest(chat_id.as_bytes());
    let hex = hex::encode(digest);
    Ok(format!("tg:{}", &hex[..17]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_all_forms() {
        assert!(validate_phone("0501234567"));
        assert!(validate_phone("972501234567"));
        assert!(validate_phone("+972501234567"));
        assert!(validate_phone("+972-50-123-4567"));
        assert!(validate_phone("050 123 4567"));
        // 8-digit landline
        assert!(validate_phone("031234567"));
    }

    #[test]
    fn test_validate_rejects_garbage() {
        assert!(!validate_phone(""));
        assert!(!validate_phone("12345"));
        assert!(!validate_phone("+1-555-0100"));
        assert!(!validate_phone("05012345"));
        assert!(!validate_phone("05012345678"));
        assert!(!validate_phone("050123456a"));
        assert!(!validate_phone("tg:42"));
    }

    #[test]
    fn test_normalize_canonical_form() {
        assert_eq!(normalize_phone("0501234567").unwrap(), "+972501234567");
        assert_eq!(normalize_phone("972501234567").unwrap(), "+972501234567");
        assert_eq!(normalize_phone("+972 50-123-4567").unwrap(), "+972501234567");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_phone("050-123-4567").unwrap();
        let twice = normalize_phone(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_rejects_invalid() {
        assert!(matches!(
            normalize_phone("hello"),
            Err(DispatchError::InvalidPhone(_))
        ));
    }

    #[test]
    fn test_mask_keeps_prefix_only() {
        assert_eq!(mask_phone("+972501234567"), "+97250123****");
        assert_eq!(mask_phone("0501234567"), "+97250123****");
    }

    #[test]
    fn test_mask_never_leaks_placeholder_tail() {
        let masked = mask_phone("tg:123456789012345");
        assert!(masked.starts_with("tg:1"));
        assert!(masked.ends_with("****"));
        assert!(!masked.contains("6789"));
    }

    #[test]
    fn test_placeholder_short_chat_id() {
        assert_eq!(phone_placeholder("42").unwrap(), "tg:42");
        // 17 digits: "tg:" + 17 == 20 chars, still direct
        assert_eq!(
            phone_placeholder("12345678901234567").unwrap(),
            "tg:12345678901234567"
        );
    }

    #[test]
    fn test_placeholder_long_chat_id_is_hashed() {
        let p = phone_placeholder("123456789012345678").unwrap();
        assert_eq!(p.len(), 20);
        assert!(p.starts_with("tg:"));
        assert!(p[3..].chars().all(|c| c.is_ascii_hexdigit()));
        // Deterministic
        assert_eq!(p, phone_placeholder("123456789012345678").unwrap());
    }

    #[test]
    fn test_placeholder_empty_fails() {
        assert!(phone_placeholder("").is_err());
    }
}
