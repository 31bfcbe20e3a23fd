//! Address validation and normalization.
//!
//! Addresses are 5–200 characters after sanitization; common Hebrew street
//! abbreviations are expanded so stored addresses compare consistently.

use shared_types::{DispatchError, DispatchResult};

use crate::sanitize::{check_for_injection, sanitize};

const MIN_LEN: usize = 5;
const MAX_LEN: usize = 200;

/// Abbreviation → expansion table applied token-wise.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("רח'", "רחוב"),
    ("רח׳", "רחוב"),
    ("שד'", "שדרות"),
    ("שד׳", "שדרות"),
    ("ת\"א", "תל אביב"),
    ("st.", "street"),
    ("ave.", "avenue"),
];

/// Expands known abbreviations and sanitizes whitespace.
pub fn normalize_address(s: &str) -> String {
    let cleaned = sanitize(s);
    let mut out_tokens: Vec<String> = Vec::new();
    for token in cleaned.split(' ') {
        let expanded = ABBREVIATIONS
            .iter()
            .find(|(abbr, _)| token == *abbr)
            .map(|(_, full)| (*full).to_string())
            .unwrap_or_else(|| token.to_string());
        out_tokens.push(expanded);
    }
    out_tokens.join(" ")
}

/// Validates and returns the normalized address.
pub fn validate_address(s: &str) -> DispatchResult<String> {
    let normalized = normalize_address(s);
    let len = normalized.chars().count();
    if len < MIN_LEN || len > MAX_LEN {
        return Err(DispatchError::InvalidAddress(format!(
            "length {len} outside [{MIN_LEN}, {MAX_LEN}]"
        )));
    }
    let (safe, pattern) = check_for_injection(&normalized);
    if !safe {
        return Err(DispatchError::InjectionDetected {
            pattern: pattern.unwrap_or("unknown").to_string(),
        });
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviation_expansion() {
        assert_eq!(normalize_address("רח' הרצל 5"), "רחוב הרצל 5");
        assert_eq!(normalize_address("שד' רוטשילד 10"), "שדרות רוטשילד 10");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_address("  רח'   הרצל 5 ");
        assert_eq!(normalize_address(&once), once);
    }

    #[test]
    fn test_length_bounds() {
        assert!(validate_address("רחוב א 1").is_ok());
        assert!(matches!(
            validate_address("abc"),
            Err(DispatchError::InvalidAddress(_))
        ));
        let long = "א".repeat(201);
        assert!(validate_address(&long).is_err());
        let exactly_200 = "א".repeat(200);
        assert!(validate_address(&exactly_200).is_ok());
    }

    #[test]
    fn test_injection_rejected() {
        assert!(matches!(
            validate_address("Herzl St'; DROP TABLE users"),
            Err(DispatchError::InjectionDetected { .. })
        ));
    }
}
