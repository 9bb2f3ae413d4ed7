//! # Gateway Cost
//!
//! Cost controls for the LLM Policy Gateway:
//! - Model pricing and cost estimates
//! - Token estimation and ceilings
//! - Daily, monthly and per-request budget enforcement
//! - The cheaper-model re-routing test

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod budget;
pub mod cost_routing;
pub mod pricing;
pub mod token_limits;

// Re-export main types
pub use budget::{
    BudgetCharge, BudgetLimits, BudgetPeriod, BudgetRejection, BudgetTracker, Spending,
};
pub use cost_routing::should_use_cheaper_model;
pub use pricing::{ModelPricing, PricingTable};
pub use token_limits::{check_token_limits, estimate_tokens, TokenLimitViolation};
