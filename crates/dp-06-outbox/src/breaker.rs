//! Circuit breakers for the external chat services.
//!
//! # States
//!
//! ```text
//!       ┌──────────┐ 5 failures ┌──────────┐  30s timeout ┌──────────┐
//!       │  CLOSED  │ ─────────► │   OPEN   │ ───────────► │HALF-OPEN │
//!       │ (normal) │            │ (reject) │              │ (probe)  │
//!       └──────────┘            └──────────┘              └──────────┘
//!             ▲                      ▲    3 successes          │
//!             └──────────────────────┼─────────────────────────┤
//!                                    └───── any failure ───────┘
//! ```
//!
//! One breaker exists per external service (`bot-api`, `webchat-user`,
//! `webchat-admin`). Instances are process-wide singletons behind a
//! double-checked registry; callers wrap every external call in
//! `breaker.execute(..)`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use shared_types::{DispatchError, DispatchResult};
use tracing::{info, warn};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "closed"),
            BreakerState::Open => write!(f, "open"),
            BreakerState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Breaker tuning. Defaults match the platform contract.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening.
    pub failure_threshold: u32,
    /// Time the circuit stays open before probing.
    pub reset_timeout: Duration,
    /// Concurrent trial calls allowed while half-open.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_max_calls: 3,
        }
    }
}

struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    success_count: u64,
    half_open_in_flight: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

/// A per-service circuit breaker.
pub struct CircuitBreaker {
    service: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(service: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            service: service.to_string(),
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                success_count: 0,
                half_open_in_flight: 0,
                half_open_successes: 0,
                opened_at: None,
            }),
        }
    }

    /// Runs `call` under the breaker. Short-circuits with
    /// `SERVICE_UNAVAILABLE` while open; transitions per the state machine
    /// on the call's outcome.
    pub async fn execute<F, Fut, T, E>(&self, call: F) -> DispatchResult<Result<T, E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.before_call()?;
        let result = call().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        Ok(result)
    }

    fn before_call(&self) -> DispatchResult<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.reset_timeout {
                    info!(service = %self.service, "circuit breaker transitioning to half-open");
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_in_flight = 1;
                    inner.half_open_successes = 0;
                    Ok(())
                } else {
                    Err(DispatchError::ServiceUnavailable {
                        service: self.service.clone(),
                    })
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_in_flight >= self.config.half_open_max_calls {
                    return Err(DispatchError::ServiceUnavailable {
                        service: self.service.clone(),
                    });
                }
                inner.half_open_in_flight += 1;
                Ok(())
            }
        }
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.success_count += 1;
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_max_calls {
                    info!(service = %self.service, "circuit breaker closed after successful probes");
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.opened_at = None;
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Records a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    warn!(
                        service = %self.service,
                        failures = inner.failure_count,
                        timeout_secs = self.config.reset_timeout.as_secs(),
                        "circuit breaker opened"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                warn!(service = %self.service, "circuit breaker reopened after probe failure");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_in_flight = 0;
                inner.half_open_successes = 0;
            }
            BreakerState::Open => {
                inner.opened_at = Some(Instant::now());
            }
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Snapshot for the debug surface.
    pub fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock();
        let retry_after = match (inner.state, inner.opened_at) {
            (BreakerState::Open, Some(at)) => self
                .config
                .reset_timeout
                .saturating_sub(at.elapsed())
                .as_secs(),
            _ => 0,
        };
        BreakerStats {
            service: self.service.clone(),
            state: inner.state.to_string(),
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            retry_after_seconds: retry_after,
        }
    }

    /// Operator reset back to closed.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        info!(service = %self.service, "circuit breaker manually reset");
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.half_open_in_flight = 0;
        inner.half_open_successes = 0;
        inner.opened_at = None;
    }
}

/// Debug snapshot of one breaker.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStats {
    pub service: String,
    pub state: String,
    pub failure_count: u32,
    pub success_count: u64,
    pub retry_after_seconds: u64,
}

static REGISTRY: Lazy<RwLock<HashMap<String, Arc<CircuitBreaker>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The process-wide breaker for `service`; created on first use
/// (double-checked so concurrent callers share one instance).
pub fn breaker_for(service: &str) -> Arc<CircuitBreaker> {
    if let Some(breaker) = REGISTRY.read().get(service) {
        return Arc::clone(breaker);
    }
    let mut registry = REGISTRY.write();
    Arc::clone(
        registry
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(service, CircuitBreakerConfig::default()))),
    )
}

/// Stats for all registered breakers (debug surface).
pub fn breaker_stats() -> Vec<BreakerStats> {
    let registry = REGISTRY.read();
    let mut stats: Vec<BreakerStats> = registry.values().map(|b| b.stats()).collect();
    stats.sort_by(|a, b| a.service.cmp(&b.service));
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_millis(50),
            half_open_max_calls: 2,
        }
    }

    #[test]
    fn test_starts_closed() {
        let breaker = CircuitBreaker::new("test", test_config());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new("test", test_config());
        for _ in 0..3 {
            breaker.before_call().unwrap();
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn test_open_short_circuits() {
        let mut config = test_config();
        config.reset_timeout = Duration::from_secs(1000);
        let breaker = CircuitBreaker::new("test", config);
        for _ in 0..3 {
            breaker.record_failure();
        }
        let err = breaker.before_call().unwrap_err();
        assert!(matches!(err, DispatchError::ServiceUnavailable { .. }));
    }

    #[test]
    fn test_half_open_after_timeout() {
        let breaker = CircuitBreaker::new("test", test_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(80));
        assert!(breaker.before_call().is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn test_half_open_limits_concurrent_probes() {
        let breaker = CircuitBreaker::new("test", test_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(80));
        assert!(breaker.before_call().is_ok()); // probe 1 (transition)
        assert!(breaker.before_call().is_ok()); // probe 2
        assert!(breaker.before_call().is_err()); // over the limit
    }

    #[test]
    fn test_closes_after_successful_probes() {
        let breaker = CircuitBreaker::new("test", test_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(80));
        breaker.before_call().unwrap();
        breaker.record_success();
        breaker.before_call().unwrap();
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_reopens_on_probe_failure() {
        let breaker = CircuitBreaker::new("test", test_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(80));
        breaker.before_call().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let breaker = CircuitBreaker::new("test", test_config());
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_registry_returns_same_instance() {
        let a = breaker_for("registry-test");
        let b = breaker_for("registry-test");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_execute_passes_through_result() {
        let breaker = CircuitBreaker::new("test", test_config());
        let ok: Result<i32, &str> = breaker.execute(|| async { Ok(42) }).await.unwrap();
        assert_eq!(ok, Ok(42));
        let err: Result<i32, &str> = breaker.execute(|| async { Err("boom") }).await.unwrap();
        assert_eq!(err, Err("boom"));
    }

    #[test]
    fn test_manual_reset() {
        let breaker = CircuitBreaker::new("test", test_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        breaker.reset();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
