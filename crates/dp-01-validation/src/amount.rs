//! Monetary amount validation: 0 ≤ x ≤ 100 000 with at most 2 decimal
//! places, matching the NUMERIC(10,2) columns.

use rust_decimal::Decimal;
use shared_types::{has_money_scale, DispatchError, DispatchResult};

const MAX_AMOUNT: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);

/// Validates an amount for wallet and fee operations.
pub fn validate_amount(amount: Decimal) -> DispatchResult<Decimal> {
    if amount < Decimal::ZERO || amount > MAX_AMOUNT {
        return Err(DispatchError::AmountOutOfRange(amount));
    }
    if !has_money_scale(amount) {
        return Err(DispatchError::AmountOutOfRange(amount));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bounds() {
        assert!(validate_amount(dec!(0)).is_ok());
        assert!(validate_amount(dec!(100000)).is_ok());
        assert!(validate_amount(dec!(25.50)).is_ok());
        assert!(validate_amount(dec!(-0.01)).is_err());
        assert!(validate_amount(dec!(100000.01)).is_err());
    }

    #[test]
    fn test_scale_limit() {
        assert!(validate_amount(dec!(10.25)).is_ok());
        assert!(validate_amount(dec!(10.255)).is_err());
    }
}
