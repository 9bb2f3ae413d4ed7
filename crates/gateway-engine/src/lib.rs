//! # Gateway Engine
//!
//! Ties the policy gateway together.
//!
//! A request flows through:
//! - Provider selection and fallback planning
//! - Exact and semantic response cache lookups
//! - Token ceilings, cost-aware re-routing and budget authorization
//! - Retries, circuit breakers, timeouts and degradation during execution
//!
//! The upstream call itself is injected through
//! [`gateway_core::UpstreamInvoker`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod gateway;
pub mod outcome;

// Re-export main types
pub use builder::PolicyGatewayBuilder;
pub use gateway::PolicyGateway;
pub use outcome::{GatewayOutcome, GatewayStatus};
