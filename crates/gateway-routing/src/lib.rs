//! # Gateway Routing
//!
//! Policy driven provider selection for the LLM Policy Gateway.
//!
//! This crate provides:
//! - Query complexity classification
//! - Provider and model selection (requested, complexity rules, cost/quality trade-off)
//! - Fallback chain resolution and execution plans

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod complexity;
pub mod router;

// Re-export main types
pub use complexity::{classify_complexity, COMPLEX_INDICATORS};
pub use router::{fallback_chain, select_with_policy, RouteDecision, RouteQuery, RouteReason, Router};
