//! # Gateway Telemetry
//!
//! Observability for the LLM Policy Gateway.
//!
//! This crate provides:
//! - Structured logging through `tracing-subscriber` (pretty, compact or JSON)
//! - Prometheus counters and gauges for cache, upstream, budget and breakers

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

// Re-export main types
pub use error::TelemetryError;
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::GatewayMetrics;
