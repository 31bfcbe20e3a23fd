//! Structured logging setup.
//!
//! Logs are formatted as JSON with consistent fields:
//! - `timestamp`: ISO 8601 timestamp
//! - `level`: Log level (trace, debug, info, warn, error)
//! - `target`: Module path of the emitter
//! - `message`: Log message
//! - span fields, including `correlation_id` where a request span is active
//!
//! Phone numbers are masked by callers before reaching a field; raw phones
//! in logs are a defect.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Guard that keeps the subscriber installed. Drop on process exit.
pub struct TelemetryGuard {
    _private: (),
}

/// Initialize the global tracing subscriber.
///
/// Returns a guard that should be held for the lifetime of the process.
/// Calling twice returns an error from the underlying subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    if config.json_logs {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;
    } else {
        let layer = fmt::layer().with_target(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;
    }

    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Structured logging configured"
    );

    Ok(TelemetryGuard { _private: () })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = TelemetryConfig {
            log_level: "no-such-level=".to_string(),
            ..TelemetryConfig::default()
        };
        assert!(init_telemetry(&config).is_err());
    }
}
