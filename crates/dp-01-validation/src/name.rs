//! Display-name validation. Names are 1–100 characters after sanitization;
//! raw values are stored, HTML escaping happens at render time.

use shared_types::{DispatchError, DispatchResult};

use crate::sanitize::{check_for_injection, sanitize};

const MAX_LEN: usize = 100;

/// Validates and returns the sanitized name.
pub fn validate_name(s: &str) -> DispatchResult<String> {
    let cleaned = sanitize(s);
    let len = cleaned.chars().count();
    if len == 0 || len > MAX_LEN {
        return Err(DispatchError::InvalidName(format!(
            "length {len} outside [1, {MAX_LEN}]"
        )));
    }
    let (safe, pattern) = check_for_injection(&cleaned);
    if !safe {
        return Err(DispatchError::InjectionDetected {
            pattern: pattern.unwrap_or("unknown").to_string(),
        });
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert_eq!(validate_name("יוסי").unwrap(), "יוסי");
        assert_eq!(validate_name("  יוסי  כהן ").unwrap(), "יוסי כהן");
    }

    #[test]
    fn test_empty_rejected() {
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn test_too_long_rejected() {
        assert!(validate_name(&"x".repeat(101)).is_err());
        assert!(validate_name(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn test_script_rejected() {
        assert!(matches!(
            validate_name("<script>alert(1)</script>"),
            Err(DispatchError::InjectionDetected { .. })
        ));
    }
}
