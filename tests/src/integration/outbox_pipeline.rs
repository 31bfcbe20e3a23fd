//! Outbox pipeline properties: the retry schedule, breaker behavior under
//! a failing sender, and markup conversion at the adapter boundary.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dp_06_outbox::breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
    use dp_06_outbox::markup::html_to_webchat;
    use dp_06_outbox::next_backoff_secs;
    use dp_06_outbox::senders::SendError;

    #[test]
    fn test_retry_schedule_matches_contract() {
        // First failure at t=0 with base 60: next attempt at ~t+120.
        assert_eq!(next_backoff_secs(1, 60, 3600), 120);
        assert_eq!(next_backoff_secs(2, 60, 3600), 240);
        // Capped at one hour regardless of retry count.
        for retry_count in [6, 10, 100, i32::MAX] {
            assert_eq!(next_backoff_secs(retry_count, 60, 3600), 3600);
        }
    }

    #[test]
    fn test_transient_statuses_drive_retry() {
        for status in [429u16, 500, 502, 503, 504] {
            assert!(SendError::from_status(status, String::new()).is_transient());
        }
        for status in [400u16, 401, 403, 404] {
            assert!(!SendError::from_status(status, String::new()).is_transient());
        }
    }

    #[tokio::test]
    async fn test_breaker_short_circuits_a_dead_service() {
        let breaker = CircuitBreaker::new(
            "flaky",
            CircuitBreakerConfig {
                failure_threshold: 5,
                reset_timeout: Duration::from_secs(30),
                half_open_max_calls: 3,
            },
        );

        // Five consecutive failures open the circuit.
        for _ in 0..5 {
            let result: shared_types::DispatchResult<Result<(), &str>> =
                breaker.execute(|| async { Err("503") }).await;
            assert!(result.unwrap().is_err());
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        // Sixth call never reaches the sender.
        let short_circuit: shared_types::DispatchResult<Result<(), &str>> =
            breaker.execute(|| async { panic!("must not be called") }).await;
        assert!(matches!(
            short_circuit,
            Err(shared_types::DispatchError::ServiceUnavailable { .. })
        ));
    }

    #[test]
    fn test_breaker_stats_expose_retry_window() {
        let breaker = CircuitBreaker::new(
            "stats",
            CircuitBreakerConfig {
                failure_threshold: 1,
                reset_timeout: Duration::from_secs(30),
                half_open_max_calls: 3,
            },
        );
        breaker.record_failure();
        let stats = breaker.stats();
        assert_eq!(stats.state, "open");
        assert!(stats.retry_after_seconds <= 30);
        assert!(stats.retry_after_seconds > 25);
    }

    #[test]
    fn test_outbound_html_reaches_webchat_as_markup() {
        let bot_text = "<b>משלוח חדש!</b>\nמ: הרצל 5\nתשלום: 25.00 ₪";
        let converted = html_to_webchat(bot_text);
        assert_eq!(converted, "*משלוח חדש!*\nמ: הרצל 5\nתשלום: 25.00 ₪");
        // Converting a second time changes nothing.
        assert_eq!(html_to_webchat(&converted), converted);
    }
}
