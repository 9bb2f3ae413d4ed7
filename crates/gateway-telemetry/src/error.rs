//! Telemetry error types

use thiserror::Error;

/// Telemetry initialization error
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to install the tracing subscriber
    #[error("Failed to initialize logging: {0}")]
    Init(String),

    /// Metric registration or encoding failed
    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl From<prometheus::Error> for TelemetryError {
    fn from(err: prometheus::Error) -> Self {
        Self::Metrics(err.to_string())
    }
}
