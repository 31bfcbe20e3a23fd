//! # Money
//!
//! Fixed-precision amounts. All balances, fees, and ledger amounts are
//! `Decimal` with NUMERIC(10,2) semantics; serialization at API boundaries
//! is a 2-dp string rounded half-up.

use rust_decimal::{Decimal, RoundingStrategy};

/// Fixed-precision monetary amount.
pub type Money = Decimal;

/// Rounds to 2 decimal places, half-up, matching the database column scale.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Formats an amount as a 2-dp string for API output and user messages.
pub fn format_money(amount: Decimal) -> String {
    format!("{:.2}", round_money(amount))
}

/// True when the amount fits NUMERIC(10,2): at most 2 decimal places.
pub fn has_money_scale(amount: Decimal) -> bool {
    round_money(amount) == amount
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_money(dec!(10.005)), dec!(10.01));
        assert_eq!(round_money(dec!(10.004)), dec!(10.00));
        assert_eq!(round_money(dec!(-10.005)), dec!(-10.01));
    }

    #[test]
    fn test_format_always_two_places() {
        assert_eq!(format_money(dec!(10)), "10.00");
        assert_eq!(format_money(dec!(-125)), "-125.00");
        assert_eq!(format_money(dec!(0.5)), "0.50");
    }

    #[test]
    fn test_scale_check() {
        assert!(has_money_scale(dec!(10.25)));
        assert!(has_money_scale(dec!(10)));
        assert!(!has_money_scale(dec!(10.255)));
    }
}
