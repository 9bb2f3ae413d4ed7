//! Effective timeout resolution.

use gateway_config::TimeoutConfig;
use std::time::Duration;

/// Timeout for one candidate.
///
/// Precedence: per-endpoint, per-model, per-provider, the routing policy's
/// provider timeout (`hint`), then the default.
#[must_use]
pub fn resolve_timeout(
    timeouts: &TimeoutConfig,
    endpoint: &str,
    model: Option<&str>,
    provider: &str,
    hint: Option<Duration>,
) -> Duration {
    timeouts
        .per_endpoint
        .get(endpoint)
        .or_else(|| model.and_then(|m| timeouts.per_model.get(m)))
        .or_else(|| timeouts.per_provider.get(provider))
        .copied()
        .or(hint)
        .unwrap_or(timeouts.default)
}
