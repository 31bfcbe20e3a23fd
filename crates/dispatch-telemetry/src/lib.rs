//! # Dispatch Telemetry
//!
//! Structured logging and correlation-ID propagation for Dispatch-Platform.
//!
//! ## Components
//!
//! - **Logging**: `tracing` + JSON formatting; every log line carries
//!   `timestamp`, `level`, `target`, `message`, and the ambient
//!   `correlation_id` span field.
//! - **Correlation**: a UUID v7 per inbound request, stored in a tokio
//!   task-local and injected into outbound HTTP calls and worker tasks.
//!
//! `print`-style output is forbidden everywhere; all diagnostics go through
//! `tracing`. Phone numbers must be masked by the caller before they reach a
//! log field.

pub mod config;
pub mod correlation;
pub mod logging;

pub use config::TelemetryConfig;
pub use correlation::{
    correlation_scope, current_correlation_id, CorrelationId, CORRELATION_HEADER,
};
pub use logging::{init_telemetry, TelemetryGuard};

use thiserror::Error;

/// Telemetry initialization errors.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize log subscriber: {0}")]
    SubscriberInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
