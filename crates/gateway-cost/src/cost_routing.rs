//! Cost-aware re-routing decision.

use gateway_config::CostRoutingConfig;

/// Whether to re-route to a cheaper model.
///
/// True when cost routing prefers cheaper models, the estimate is above the
/// threshold, and the cheaper choice keeps at least the required quality.
#[must_use]
pub fn should_use_cheaper_model(config: &CostRoutingConfig, estimated_cost: f64, quality: f64) -> bool {
    config.enabled
        && config.prefer_cheaper
        && estimated_cost > config.cost_threshold
        && quality >= config.quality_threshold
}
