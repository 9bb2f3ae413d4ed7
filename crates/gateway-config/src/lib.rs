//! # Gateway Config
//!
//! Policy documents for the LLM Policy Gateway.
//!
//! This crate provides:
//! - Typed routing, resilience, caching and cost control policies
//! - Validation of out-of-range values
//! - YAML loading from a policy directory
//! - A store of atomically replaceable snapshots

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod caching;
pub mod cost;
pub mod error;
pub mod loader;
pub mod resilience;
pub mod routing;
mod serde_helpers;
pub mod store;

// Re-export main types
pub use caching::{CachingPolicy, EvictionPolicy, SemanticSimilarityConfig, SizeLimits, TtlConfig};
pub use cost::{BudgetConfig, CostControlPolicy, CostRoutingConfig, PricingEntry, TokenLimitConfig};
pub use error::{ConfigError, ConfigResult};
pub use loader::{
    parse_caching, parse_cost_control, parse_policy, parse_resilience, parse_routing,
    PolicyDocument, PolicyLoader, POLICIES_PATH_ENV,
};
pub use resilience::{
    BackoffType, CircuitBreakerConfig, DegradationAction, DegradationCondition, DegradationRule,
    ResiliencePolicy, RetryStrategy, TimeoutConfig,
};
pub use routing::{
    ComplexityRule, CostQualityConfig, FallbackChain, ProviderConfig, RoutingPolicy, Tier,
};
pub use store::{shared, PolicySet, PolicyStore, SharedPolicy};
