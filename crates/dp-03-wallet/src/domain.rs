//! Pure wallet rules, separated from SQL so they can be exercised without a
//! database.

use shared_types::{round_money, DispatchError, DispatchResult, Money};

/// Computes the balance after a fee debit, enforcing the credit limit.
///
/// Returns the new balance, or `InsufficientCredit` carrying the exact
/// balance and limit for the user-facing message.
pub fn compute_debit(balance: Money, credit_limit: Money, fee: Money) -> DispatchResult<Money> {
    let new_balance = round_money(balance - fee);
    if new_balance < credit_limit {
        return Err(DispatchError::InsufficientCredit {
            balance,
            credit_limit,
            fee,
        });
    }
    Ok(new_balance)
}

/// Computes the station commission for a captured fee at the given rate.
pub fn compute_commission(fee: Money, commission_rate: rust_decimal::Decimal) -> Money {
    round_money(fee * commission_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_debit_within_limit() {
        assert_eq!(compute_debit(dec!(-100), dec!(-500), dec!(25)).unwrap(), dec!(-125));
        assert_eq!(compute_debit(dec!(0), dec!(-500), dec!(500)).unwrap(), dec!(-500));
    }

    #[test]
    fn test_debit_exceeding_limit() {
        let err = compute_debit(dec!(-480), dec!(-500), dec!(50)).unwrap_err();
        match err {
            DispatchError::InsufficientCredit {
                balance,
                credit_limit,
                fee,
            } => {
                assert_eq!(balance, dec!(-480));
                assert_eq!(credit_limit, dec!(-500));
                assert_eq!(fee, dec!(50));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_debit_exactly_at_limit_succeeds() {
        assert_eq!(
            compute_debit(dec!(-480), dec!(-500), dec!(20)).unwrap(),
            dec!(-500)
        );
    }

    #[test]
    fn test_commission_rounding() {
        // 25 * 0.08 = 2.00
        assert_eq!(compute_commission(dec!(25), dec!(0.08)), dec!(2.00));
        // 33.33 * 0.07 = 2.3331 -> 2.33
        assert_eq!(compute_commission(dec!(33.33), dec!(0.07)), dec!(2.33));
        // half-up: 12.50 * 0.06 = 0.75
        assert_eq!(compute_commission(dec!(12.50), dec!(0.06)), dec!(0.75));
    }
}
