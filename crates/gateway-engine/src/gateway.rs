//! Request orchestration.
//!
//! [`PolicyGateway::handle`] runs one request through routing, the response
//! cache, token and budget checks, and the resilience executor. Every
//! component reads its policy from the shared [`PolicyStore`], so policy
//! replacements apply to the next request without a restart.

use crate::builder::PolicyGatewayBuilder;
use crate::outcome::{GatewayOutcome, GatewayStatus};
use chrono::{DateTime, Utc};
use gateway_cache::{CacheKey, CacheManager, CacheSource};
use gateway_config::{
    CachingPolicy, CostControlPolicy, PolicyLoader, PolicySet, PolicyStore, ResiliencePolicy,
    RoutingPolicy,
};
use gateway_core::{
    CallTarget, CostMode, GatewayError, GatewayResult, InferenceRequest, UpstreamInvoker,
    UpstreamResponse,
};
use gateway_cost::{
    check_token_limits, estimate_tokens, should_use_cheaper_model, BudgetCharge, BudgetPeriod,
    BudgetTracker, PricingTable,
};
use gateway_resilience::{CircuitBreakerRegistry, ResilienceExecutor};
use gateway_routing::{RouteDecision, RouteQuery, Router};
use gateway_telemetry::GatewayMetrics;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Request counters
#[derive(Debug, Default)]
pub(crate) struct GatewayStats {
    requests: AtomicU64,
    errors: AtomicU64,
}

/// Policy-driven LLM gateway
pub struct PolicyGateway {
    pub(crate) store: PolicyStore,
    pub(crate) router: Router,
    pub(crate) executor: ResilienceExecutor,
    pub(crate) breakers: Arc<CircuitBreakerRegistry>,
    pub(crate) cache: CacheManager,
    pub(crate) budget: BudgetTracker,
    pub(crate) metrics: Option<GatewayMetrics>,
    pub(crate) stats: GatewayStats,
    pub(crate) started_at: DateTime<Utc>,
}

impl fmt::Debug for PolicyGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyGateway")
            .field("providers", &self.store.routing().providers.len())
            .field("breakers", &self.breakers.len())
            .field("requests", &self.stats.requests.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Cost estimate for one route
struct CostEstimate {
    input_tokens: u32,
    output_tokens: u32,
    amount: f64,
}

impl PolicyGateway {
    /// Create a gateway builder
    #[must_use]
    pub fn builder() -> PolicyGatewayBuilder {
        PolicyGatewayBuilder::new()
    }

    /// Serve one request.
    ///
    /// # Errors
    /// - `InvalidRequest` / `ProviderDisabled` for unusable requests
    /// - `TokenLimitExceeded` / `BudgetExceeded` before any upstream call
    /// - `CircuitOpen`, `AllCandidatesExhausted` or `Cancelled` from execution
    #[instrument(
        skip(self, request, invoker, cancel),
        fields(request_id = %request.id, agent = %request.agent)
    )]
    pub async fn handle(
        &self,
        request: &InferenceRequest,
        invoker: &dyn UpstreamInvoker,
        cancel: &CancellationToken,
    ) -> GatewayResult<GatewayOutcome> {
        let started = Instant::now();
        self.stats.requests.fetch_add(1, Ordering::Relaxed);

        let result = self.serve(request, invoker, cancel, started).await;

        let outcome_label = match &result {
            Ok(outcome) if outcome.served_from_cache => "cache_hit",
            Ok(_) => "success",
            Err(err) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                err.category()
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.record_request(outcome_label, started.elapsed().as_secs_f64());
            self.publish_gauges(metrics);
        }
        result
    }

    async fn serve(
        &self,
        request: &InferenceRequest,
        invoker: &dyn UpstreamInvoker,
        cancel: &CancellationToken,
        started: Instant,
    ) -> GatewayResult<GatewayOutcome> {
        request.validate()?;
        let mut decision = self.router.route(request);
        self.check_pinned_provider(request, &decision)?;

        if let Some(outcome) = self.lookup_cache(request, &decision, false, started).await {
            return Ok(outcome);
        }

        let cost_policy = self.store.cost_control();
        let pricing = PricingTable::from_policy(&cost_policy);
        let input_tokens = estimate_tokens(&request.query);
        let output_tokens = cost_policy.token_limits.max_output_tokens;
        check_token_limits(&cost_policy.token_limits, input_tokens, output_tokens).map_err(|violation| {
            warn!(violation = %violation, "Token limit exceeded");
            GatewayError::token_limit(violation)
        })?;

        let mut estimate = CostEstimate {
            input_tokens,
            output_tokens,
            amount: pricing.estimate(&decision.provider, decision.model.as_deref(), input_tokens, output_tokens),
        };

        let mut cost_rerouted = false;
        if let Some(cheaper) = self.cheaper_route(request, &decision, &cost_policy, estimate.amount) {
            let amount = pricing.estimate(&cheaper.provider, cheaper.model.as_deref(), input_tokens, output_tokens);
            info!(
                from_provider = %decision.provider,
                from_model = ?decision.model,
                to_provider = %cheaper.provider,
                to_model = ?cheaper.model,
                estimated_cost = estimate.amount,
                rerouted_cost = amount,
                "Re-routed to a cheaper model"
            );
            decision = cheaper;
            estimate.amount = amount;
            cost_rerouted = true;

            if let Some(outcome) = self.lookup_cache(request, &decision, true, started).await {
                return Ok(outcome);
            }
        }

        let charge = match self.budget.record_spending(estimate.amount) {
            Ok(charge) => charge,
            Err(rejection) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_budget_rejection(rejection.reason());
                }
                return Err(GatewayError::budget_exceeded(rejection));
            }
        };

        let plan = self.router.plan(&decision, &request.endpoint);
        let metrics = self.metrics.as_ref();
        let execution = self
            .executor
            .execute(&plan, cancel, |target: CallTarget| async move {
                let result = invoker.invoke(&target, request).await;
                if let Some(metrics) = metrics {
                    let outcome = match &result {
                        Ok(_) => "success",
                        Err(err) => err.kind.as_str(),
                    };
                    metrics.record_upstream_attempt(&target.provider, outcome);
                }
                result.map_err(GatewayError::from)
            })
            .await;

        let execution = match execution {
            Ok(execution) => execution,
            Err(err) => {
                self.budget.refund(&charge, charge.amount);
                debug!(refunded = charge.amount, "Refunded estimate after failure");
                return Err(err);
            }
        };

        let key = CacheKey::new(
            &request.query,
            &request.agent,
            &decision.provider,
            decision.model.as_deref(),
            &request.endpoint,
        );
        if let Err(err) = self.cache.set(&key, &execution.value).await {
            warn!(error = %err, "Failed to cache response");
        }

        let actual_cost = self.reconcile_spend(&pricing, &execution.value, &estimate, &charge);
        let fallback_used = execution.fallback_used();

        Ok(GatewayOutcome {
            request_id: request.id.clone(),
            provider: execution.provider,
            model: execution.model,
            response: execution.value,
            route: decision,
            served_from_cache: false,
            cache_source: None,
            cost_rerouted,
            fallback_used,
            attempts: execution.attempts,
            estimated_cost: estimate.amount,
            actual_cost,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// A pinned provider that is configured but disabled cannot be honoured
    /// when the caller also refused fallbacks
    fn check_pinned_provider(&self, request: &InferenceRequest, decision: &RouteDecision) -> GatewayResult<()> {
        let Some(requested) = request.requested_provider.as_deref() else {
            return Ok(());
        };
        if request.enable_fallback || decision.provider.eq_ignore_ascii_case(requested) {
            return Ok(());
        }
        let routing = self.store.routing();
        let disabled = routing
            .providers
            .iter()
            .any(|(name, config)| name.eq_ignore_ascii_case(requested) && !config.enabled);
        if disabled {
            return Err(GatewayError::provider_disabled(requested));
        }
        Ok(())
    }

    async fn lookup_cache(
        &self,
        request: &InferenceRequest,
        decision: &RouteDecision,
        cost_rerouted: bool,
        started: Instant,
    ) -> Option<GatewayOutcome> {
        let key = CacheKey::new(
            &request.query,
            &request.agent,
            &decision.provider,
            decision.model.as_deref(),
            &request.endpoint,
        );
        let caching_enabled = self.store.caching().enabled;
        let hit = self.cache.get::<UpstreamResponse>(&key).await;

        if let (Some(metrics), true) = (&self.metrics, caching_enabled) {
            let label = match hit.as_ref().map(|h| h.source) {
                Some(CacheSource::Exact) => "exact",
                Some(CacheSource::Semantic { .. }) => "semantic",
                None => "miss",
            };
            metrics.record_cache_lookup(label);
        }

        let hit = hit?;
        debug!(provider = %decision.provider, source = ?hit.source, "Served from cache");
        Some(GatewayOutcome {
            request_id: request.id.clone(),
            provider: hit.value.provider.clone(),
            model: hit.value.model.clone(),
            response: hit.value,
            route: decision.clone(),
            served_from_cache: true,
            cache_source: Some(hit.source),
            cost_rerouted,
            fallback_used: false,
            attempts: Vec::new(),
            estimated_cost: 0.0,
            actual_cost: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Cost-optimized alternative, when cost routing calls for one
    fn cheaper_route(
        &self,
        request: &InferenceRequest,
        current: &RouteDecision,
        cost_policy: &CostControlPolicy,
        estimated_cost: f64,
    ) -> Option<RouteDecision> {
        if request.requested_provider.is_some() {
            return None;
        }
        let candidate = self
            .router
            .select(&RouteQuery::from_request(request).with_cost_mode(CostMode::CostOptimized));
        if candidate.provider == current.provider && candidate.model == current.model {
            return None;
        }

        let quality = self
            .store
            .routing()
            .providers
            .get(&candidate.provider)
            .map_or(0.0, |p| p.quality_tier.quality_score());

        should_use_cheaper_model(&cost_policy.cost_routing, estimated_cost, quality).then_some(candidate)
    }

    /// Settle the authorized estimate against reported usage, in the periods
    /// the estimate was charged to
    fn reconcile_spend(
        &self,
        pricing: &PricingTable,
        response: &UpstreamResponse,
        estimate: &CostEstimate,
        charge: &BudgetCharge,
    ) -> Option<f64> {
        let usage = response.usage?;
        let actual = pricing.estimate(
            &response.provider,
            response.model.as_deref(),
            usage.input_tokens,
            usage.output_tokens,
        );

        let difference = actual - estimate.amount;
        if difference < 0.0 {
            self.budget.refund(charge, -difference);
        } else if difference > 0.0 {
            if let Err(rejection) = self.budget.record_additional(charge, difference) {
                warn!(
                    actual,
                    estimated = estimate.amount,
                    estimated_input_tokens = estimate.input_tokens,
                    estimated_output_tokens = estimate.output_tokens,
                    reason = %rejection,
                    "Actual cost exceeds the remaining budget"
                );
            }
        }
        Some(actual)
    }

    fn publish_gauges(&self, metrics: &GatewayMetrics) {
        let spending = self.budget.current_spending();
        metrics.set_budget_spend("daily", spending.daily);
        metrics.set_budget_spend("monthly", spending.monthly);
        for stats in self.breakers.stats() {
            metrics.set_circuit_state(&stats.provider, stats.state.as_gauge());
        }
    }

    /// Replace all four policies at once
    ///
    /// # Errors
    /// Returns `InvalidPolicy` if any document fails validation; nothing is
    /// replaced in that case
    pub fn replace_policies(&self, policies: PolicySet) -> GatewayResult<()> {
        policies.validate()?;
        self.store.replace_all(policies);
        self.cache.reconfigure();
        Ok(())
    }

    /// Replace the routing policy
    ///
    /// # Errors
    /// Returns `InvalidPolicy` if the policy fails validation
    pub fn replace_routing(&self, policy: RoutingPolicy) -> GatewayResult<()> {
        policy.validate()?;
        self.store.replace_routing(policy);
        Ok(())
    }

    /// Replace the resilience policy
    ///
    /// # Errors
    /// Returns `InvalidPolicy` if the policy fails validation
    pub fn replace_resilience(&self, policy: ResiliencePolicy) -> GatewayResult<()> {
        policy.validate()?;
        self.store.replace_resilience(policy);
        Ok(())
    }

    /// Replace the caching policy and rebuild the cache stores
    ///
    /// # Errors
    /// Returns `InvalidPolicy` if the policy fails validation
    pub fn replace_caching(&self, policy: CachingPolicy) -> GatewayResult<()> {
        policy.validate()?;
        self.store.replace_caching(policy);
        self.cache.reconfigure();
        Ok(())
    }

    /// Replace the cost control policy
    ///
    /// # Errors
    /// Returns `InvalidPolicy` if the policy fails validation
    pub fn replace_cost_control(&self, policy: CostControlPolicy) -> GatewayResult<()> {
        policy.validate()?;
        self.store.replace_cost_control(policy);
        Ok(())
    }

    /// Reload every document from a policy directory
    ///
    /// # Errors
    /// Returns `InvalidPolicy` if a file cannot be read, parsed or validated;
    /// the running policies are kept in that case
    pub async fn reload_from(&self, loader: &PolicyLoader) -> GatewayResult<()> {
        let policies = loader.try_load_all().await?;
        self.replace_policies(policies)?;
        info!(dir = %loader.dir().display(), "Policies reloaded");
        Ok(())
    }

    /// Drop every cached response
    pub fn clear_caches(&self) {
        self.cache.clear();
    }

    /// Close a provider's circuit; false if the provider has no breaker yet
    pub fn reset_circuit_breaker(&self, provider: &str) -> bool {
        self.breakers.reset(provider)
    }

    /// Zero spend for a budget period
    pub fn reset_budget(&self, period: BudgetPeriod) {
        self.budget.reset(period);
    }

    /// Snapshot of live state
    #[must_use]
    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            spending: self.budget.current_spending(),
            limits: self.budget.limits(),
            cache: self.cache.stats(),
            breakers: self.breakers.stats(),
            requests: self.stats.requests.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
            started_at: self.started_at,
        }
    }

    /// Policy store
    #[must_use]
    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    /// Router
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Breaker registry
    #[must_use]
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// Response cache
    #[must_use]
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Budget tracker
    #[must_use]
    pub fn budget(&self) -> &BudgetTracker {
        &self.budget
    }

    /// Attached metrics
    #[must_use]
    pub fn metrics(&self) -> Option<&GatewayMetrics> {
        self.metrics.as_ref()
    }
}
