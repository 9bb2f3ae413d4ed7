//! Graceful degradation rules.

use gateway_config::{DegradationAction, DegradationCondition, DegradationRule};
use gateway_core::GatewayError;
use std::time::Duration;
use tracing::info;

/// A fired degradation rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradationDecision {
    /// What to do
    pub action: DegradationAction,
    /// Provider to switch to
    pub fallback_provider: Option<String>,
    /// Model to use
    pub fallback_model: Option<String>,
}

/// First rule that matches a failure, if any.
///
/// - `error_type`: the threshold appears in the error category or message
/// - `latency_threshold`: `elapsed` exceeds `max_latency`
/// - `provider_failure`: the threshold is absent, `*`, or names `provider`
#[must_use]
pub fn evaluate(
    rules: &[DegradationRule],
    error: &GatewayError,
    elapsed: Duration,
    provider: &str,
) -> Option<DegradationDecision> {
    let category = error.category();
    let message = error.to_string().to_lowercase();

    let rule = rules.iter().find(|rule| match rule.condition {
        DegradationCondition::ErrorType => rule.threshold.as_deref().is_some_and(|t| {
            let t = t.to_lowercase();
            category.contains(&t) || message.contains(&t)
        }),
        DegradationCondition::LatencyThreshold => {
            rule.max_latency.is_some_and(|max| elapsed > max)
        }
        DegradationCondition::ProviderFailure => match rule.threshold.as_deref() {
            None | Some("*") => true,
            Some(name) => name.eq_ignore_ascii_case(provider),
        },
    })?;

    info!(
        provider,
        condition = ?rule.condition,
        action = ?rule.action,
        fallback_provider = ?rule.fallback_provider,
        "Degradation rule matched"
    );

    Some(DegradationDecision {
        action: rule.action,
        fallback_provider: rule.fallback_provider.clone(),
        fallback_model: rule.fallback_model.clone(),
    })
}
