//! Integration tests for the LLM Policy Gateway
//!
//! This crate provides integration tests covering:
//! - Provider routing and fallback planning
//! - Exact and semantic response caching
//! - Retries, circuit breakers and degradation
//! - Budget and token limit enforcement
//! - End-to-end request flows and policy reloads

pub mod fixtures;
pub mod helpers;
pub mod mock_providers;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;
pub use mock_providers::*;

#[cfg(test)]
mod budget_tests;
#[cfg(test)]
mod cache_tests;
#[cfg(test)]
mod resilience_tests;
#[cfg(test)]
mod routing_tests;
