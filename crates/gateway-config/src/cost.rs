//! Cost control policy document: budgets, token limits, cost-aware routing
//! and model pricing.

use crate::error::{ConfigError, ConfigResult};
use crate::serde_helpers::{default_true, default_version};
use serde::{Deserialize, Serialize};

/// Spending caps in USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Enforce the caps
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cap per budget day
    #[serde(default = "default_daily_limit", alias = "daily_limit_usd")]
    pub daily_limit: f64,

    /// Cap per calendar month
    #[serde(default = "default_monthly_limit", alias = "monthly_limit_usd")]
    pub monthly_limit: f64,

    /// Cap on a single request
    #[serde(default = "default_per_request_limit", alias = "per_request_limit_usd")]
    pub per_request_limit: f64,

    /// UTC hour (0-23) at which the budget day starts
    #[serde(default)]
    pub reset_hour: u32,
}

fn default_daily_limit() -> f64 {
    100.0
}

fn default_monthly_limit() -> f64 {
    3000.0
}

fn default_per_request_limit() -> f64 {
    1.0
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_limit: default_daily_limit(),
            monthly_limit: default_monthly_limit(),
            per_request_limit: default_per_request_limit(),
            reset_hour: 0,
        }
    }
}

/// Token ceilings applied before any upstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLimitConfig {
    /// Enforce the ceilings
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prompt tokens
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: u32,

    /// Completion tokens
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Prompt plus completion
    #[serde(default = "default_max_total_tokens")]
    pub max_total_tokens: u32,
}

fn default_max_input_tokens() -> u32 {
    100_000
}

fn default_max_output_tokens() -> u32 {
    4_000
}

fn default_max_total_tokens() -> u32 {
    104_000
}

impl Default for TokenLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_input_tokens: default_max_input_tokens(),
            max_output_tokens: default_max_output_tokens(),
            max_total_tokens: default_max_total_tokens(),
        }
    }
}

/// Cost-aware re-routing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRoutingConfig {
    /// Enable cost-aware routing
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prefer cheaper models when the estimate crosses `cost_threshold`
    #[serde(default = "default_true", alias = "prefer_cheaper_models")]
    pub prefer_cheaper: bool,

    /// Estimated cost (USD) above which a cheaper model is preferred
    #[serde(default = "default_cost_threshold", alias = "cost_threshold_usd")]
    pub cost_threshold: f64,

    /// Minimum quality score (0.0 - 1.0) the cheaper choice must keep
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
}

fn default_cost_threshold() -> f64 {
    0.01
}

fn default_quality_threshold() -> f64 {
    0.7
}

impl Default for CostRoutingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefer_cheaper: true,
            cost_threshold: default_cost_threshold(),
            quality_threshold: default_quality_threshold(),
        }
    }
}

/// Price of one model, USD per 1K tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingEntry {
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
    /// Prompt price
    #[serde(default)]
    pub input_cost_per_1k: f64,
    /// Completion price
    #[serde(default)]
    pub output_cost_per_1k: f64,
}

impl PricingEntry {
    /// Create a pricing entry
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        input_cost_per_1k: f64,
        output_cost_per_1k: f64,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            input_cost_per_1k,
            output_cost_per_1k,
        }
    }
}

fn default_pricing() -> Vec<PricingEntry> {
    vec![
        PricingEntry::new("openai", "gpt-4o-mini", 0.000_15, 0.000_6),
        PricingEntry::new("openai", "gpt-4o", 0.002_5, 0.01),
        PricingEntry::new("anthropic", "claude-3-5-sonnet", 0.003, 0.015),
    ]
}

/// Cost control policy snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostControlPolicy {
    /// Policy version
    #[serde(default = "default_version")]
    pub version: String,

    /// Spending caps
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Token ceilings
    #[serde(default)]
    pub token_limits: TokenLimitConfig,

    /// Cost-aware routing
    #[serde(default)]
    pub cost_routing: CostRoutingConfig,

    /// Model prices
    #[serde(default = "default_pricing")]
    pub pricing: Vec<PricingEntry>,
}

impl Default for CostControlPolicy {
    fn default() -> Self {
        Self {
            version: default_version(),
            budget: BudgetConfig::default(),
            token_limits: TokenLimitConfig::default(),
            cost_routing: CostRoutingConfig::default(),
            pricing: default_pricing(),
        }
    }
}

impl CostControlPolicy {
    /// Validate the policy
    ///
    /// # Errors
    /// Returns error if `reset_hour` is not a valid hour, or a limit or
    /// price is negative
    pub fn validate(&self) -> ConfigResult<()> {
        if self.budget.reset_hour > 23 {
            return Err(ConfigError::invalid(
                "cost_control",
                "budget.reset_hour",
                format!("must be between 0 and 23, got {}", self.budget.reset_hour),
            ));
        }

        let limits = [
            ("budget.daily_limit", self.budget.daily_limit),
            ("budget.monthly_limit", self.budget.monthly_limit),
            ("budget.per_request_limit", self.budget.per_request_limit),
            ("cost_routing.cost_threshold", self.cost_routing.cost_threshold),
        ];
        for (field, value) in limits {
            if value < 0.0 || value.is_nan() {
                return Err(ConfigError::invalid("cost_control", field, "must not be negative"));
            }
        }

        if !(0.0..=1.0).contains(&self.cost_routing.quality_threshold) {
            return Err(ConfigError::invalid(
                "cost_control",
                "cost_routing.quality_threshold",
                "must be between 0.0 and 1.0",
            ));
        }

        for entry in &self.pricing {
            if entry.input_cost_per_1k < 0.0 || entry.output_cost_per_1k < 0.0 {
                return Err(ConfigError::invalid(
                    "cost_control",
                    format!("pricing.{}.{}", entry.provider, entry.model),
                    "prices must not be negative",
                ));
            }
        }

        Ok(())
    }
}
