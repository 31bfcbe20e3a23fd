//! Cross-crate invariants: wallet arithmetic, the delivery state machine,
//! and validator idempotence.

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use shared_types::{DeliveryStatus, DispatchError};

    use dp_01_validation::{normalize_phone, sanitize};
    use dp_03_wallet::compute_debit;

    #[test]
    fn test_every_undeclared_transition_is_rejected() {
        use DeliveryStatus::*;
        let all = [Open, PendingApproval, Captured, InProgress, Delivered, Cancelled];
        let allowed = [
            (Open, PendingApproval),
            (Open, Captured),
            (Open, Cancelled),
            (PendingApproval, Captured),
            (PendingApproval, Cancelled),
            (Captured, InProgress),
            (InProgress, Delivered),
        ];
        for from in all {
            for to in all {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition(to),
                    expected,
                    "transition {from:?} -> {to:?}"
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        use DeliveryStatus::*;
        for terminal in [Delivered, Cancelled] {
            for to in [Open, PendingApproval, Captured, InProgress, Delivered, Cancelled] {
                if terminal == to {
                    continue;
                }
                assert!(!terminal.can_transition(to));
            }
        }
    }

    #[test]
    fn test_sequential_debits_stop_at_the_limit() {
        // Two debits that together would exceed the limit: the first lands,
        // the second is refused, and the history stays consistent.
        let balance = dec!(-300);
        let limit = dec!(-500);

        let after_first = compute_debit(balance, limit, dec!(150)).unwrap();
        assert_eq!(after_first, dec!(-450));

        let second = compute_debit(after_first, limit, dec!(150));
        match second {
            Err(DispatchError::InsufficientCredit {
                balance, fee, ..
            }) => {
                assert_eq!(balance, dec!(-450));
                assert_eq!(fee, dec!(150));
            }
            other => panic!("expected InsufficientCredit, got {other:?}"),
        }
    }

    #[test]
    fn test_phone_normalization_is_idempotent() {
        for raw in ["0501234567", "972 50-123-4567", "+972501234567"] {
            let once = normalize_phone(raw).unwrap();
            assert_eq!(normalize_phone(&once).unwrap(), once);
        }
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for raw in ["  שלום   עולם ", "a\u{0}b", "", "clean"] {
            let once = sanitize(raw);
            assert_eq!(sanitize(&once), once);
        }
    }

    #[test]
    fn test_error_codes_survive_refactors() {
        // These codes are wire-stable; a change here breaks panel clients.
        assert_eq!(DispatchError::DeliveryNotFound.code(), 2002);
        assert_eq!(DispatchError::DuplicateCharge { delivery_id: 0 }.code(), 3001);
        assert_eq!(
            DispatchError::InsufficientCredit {
                balance: dec!(0),
                credit_limit: dec!(0),
                fee: dec!(0),
            }
            .code(),
            3002
        );
        assert_eq!(
            DispatchError::DeliveryNotAvailable { status: String::new() }.code(),
            3003
        );
        assert_eq!(
            DispatchError::InvalidStateTransition {
                from: String::new(),
                to: String::new(),
            }
            .code(),
            3004
        );
        assert_eq!(
            DispatchError::CourierBlacklisted {
                courier_id: 0,
                station_id: 0,
            }
            .code(),
            3005
        );
    }
}
