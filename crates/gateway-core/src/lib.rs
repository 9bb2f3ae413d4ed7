//! # Gateway Core
//!
//! Core types, traits, and error handling for the LLM Policy Gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - The inbound request type
//! - The upstream provider contract and execution plans
//! - Error types and handling
//! - A clock abstraction for calendar-based budgets

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod request;
pub mod types;
pub mod upstream;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{GatewayError, GatewayResult};
pub use request::{InferenceRequest, InferenceRequestBuilder, DEFAULT_AGENT, DEFAULT_ENDPOINT};
pub use types::{CostMode, QueryComplexity, RequestId};
pub use upstream::{
    CallTarget, Candidate, ExecutionPlan, TokenUsage, UpstreamError, UpstreamErrorKind,
    UpstreamInvoker, UpstreamResponse,
};
