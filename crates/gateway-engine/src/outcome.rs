//! Results of gateway operations.

use chrono::{DateTime, Utc};
use gateway_cache::{CacheSource, CacheStats};
use gateway_core::{RequestId, UpstreamResponse};
use gateway_cost::{BudgetLimits, Spending};
use gateway_resilience::{CandidateAttempt, CircuitBreakerStats};
use gateway_routing::RouteDecision;
use serde::Serialize;

/// A served request
#[derive(Debug, Clone, Serialize)]
pub struct GatewayOutcome {
    /// Request ID
    pub request_id: RequestId,
    /// Response, fresh or cached
    pub response: UpstreamResponse,
    /// Provider that produced the response
    pub provider: String,
    /// Model that produced the response
    pub model: Option<String>,
    /// Routing decision the request was served under
    pub route: RouteDecision,
    /// Served without an upstream call
    pub served_from_cache: bool,
    /// Kind of cache match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_source: Option<CacheSource>,
    /// The cost check moved the request to a cheaper route
    pub cost_rerouted: bool,
    /// A provider other than the primary answered
    pub fallback_used: bool,
    /// Candidates tried
    pub attempts: Vec<CandidateAttempt>,
    /// Cost authorized before the call (USD)
    pub estimated_cost: f64,
    /// Cost from reported usage (USD)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_cost: Option<f64>,
    /// Wall time spent
    pub elapsed_ms: u64,
}

/// Snapshot of live gateway state
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    /// Spend in the current periods
    pub spending: Spending,
    /// Budget caps
    pub limits: BudgetLimits,
    /// Cache counters
    pub cache: CacheStats,
    /// Breaker states by provider
    pub breakers: Vec<CircuitBreakerStats>,
    /// Requests handled
    pub requests: u64,
    /// Requests that ended in an error
    pub errors: u64,
    /// When the gateway was built
    pub started_at: DateTime<Utc>,
}
