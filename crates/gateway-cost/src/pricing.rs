//! Model pricing.

use gateway_config::CostControlPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Model pricing information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Provider ID
    pub provider: String,
    /// Model ID
    pub model: String,
    /// Cost per 1K input tokens (USD)
    pub input_cost_per_1k: f64,
    /// Cost per 1K output tokens (USD)
    pub output_cost_per_1k: f64,
}

impl ModelPricing {
    /// Create pricing with zero rates
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            input_cost_per_1k: 0.0,
            output_cost_per_1k: 0.0,
        }
    }

    /// Set pricing rates
    #[must_use]
    pub fn with_pricing(mut self, input_per_1k: f64, output_per_1k: f64) -> Self {
        self.input_cost_per_1k = input_per_1k;
        self.output_cost_per_1k = output_per_1k;
        self
    }

    /// Calculate cost for given token counts
    #[must_use]
    pub fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input_cost = (f64::from(input_tokens) / 1000.0) * self.input_cost_per_1k;
        let output_cost = (f64::from(output_tokens) / 1000.0) * self.output_cost_per_1k;
        input_cost + output_cost
    }
}

/// Pricing lookup keyed by provider and model
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    entries: HashMap<(String, String), ModelPricing>,
}

impl PricingTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the cost control policy's pricing entries
    #[must_use]
    pub fn from_policy(policy: &CostControlPolicy) -> Self {
        let mut table = Self::new();
        for entry in &policy.pricing {
            table.insert(
                ModelPricing::new(&entry.provider, &entry.model)
                    .with_pricing(entry.input_cost_per_1k, entry.output_cost_per_1k),
            );
        }
        table
    }

    /// Add or replace pricing
    pub fn insert(&mut self, pricing: ModelPricing) {
        let key = (pricing.provider.to_lowercase(), pricing.model.clone());
        self.entries.insert(key, pricing);
    }

    /// Pricing for a provider/model pair; provider names are case-insensitive
    #[must_use]
    pub fn get(&self, provider: &str, model: &str) -> Option<&ModelPricing> {
        self.entries.get(&(provider.to_lowercase(), model.to_string()))
    }

    /// Estimated cost in USD; unknown models cost nothing
    #[must_use]
    pub fn estimate(
        &self,
        provider: &str,
        model: Option<&str>,
        input_tokens: u32,
        output_tokens: u32,
    ) -> f64 {
        match model.and_then(|m| self.get(provider, m)) {
            Some(pricing) => pricing.calculate_cost(input_tokens, output_tokens),
            None => {
                debug!(provider, model = ?model, "No pricing for model");
                0.0
            }
        }
    }

    /// Number of priced models
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
