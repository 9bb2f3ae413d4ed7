//! Gateway construction.

use crate::gateway::{GatewayStats, PolicyGateway};
use chrono::Utc;
use gateway_cache::{CacheManager, Embedder};
use gateway_config::{
    CachingPolicy, CostControlPolicy, PolicySet, PolicyStore, ResiliencePolicy, RoutingPolicy,
};
use gateway_core::{Clock, GatewayError, GatewayResult, SystemClock};
use gateway_cost::BudgetTracker;
use gateway_resilience::{CircuitBreakerRegistry, ResilienceExecutor};
use gateway_routing::Router;
use gateway_telemetry::GatewayMetrics;
use std::sync::Arc;
use tracing::info;

/// Builder for [`PolicyGateway`]
#[derive(Default)]
pub struct PolicyGatewayBuilder {
    policies: PolicySet,
    clock: Option<Arc<dyn Clock>>,
    embedder: Option<Arc<dyn Embedder>>,
    metrics: Option<GatewayMetrics>,
}

impl PolicyGatewayBuilder {
    /// Create a builder with default policies
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use all four policies
    #[must_use]
    pub fn policies(mut self, policies: PolicySet) -> Self {
        self.policies = policies;
        self
    }

    /// Set the routing policy
    #[must_use]
    pub fn routing(mut self, policy: RoutingPolicy) -> Self {
        self.policies.routing = policy;
        self
    }

    /// Set the resilience policy
    #[must_use]
    pub fn resilience(mut self, policy: ResiliencePolicy) -> Self {
        self.policies.resilience = policy;
        self
    }

    /// Set the caching policy
    #[must_use]
    pub fn caching(mut self, policy: CachingPolicy) -> Self {
        self.policies.caching = policy;
        self
    }

    /// Set the cost control policy
    #[must_use]
    pub fn cost_control(mut self, policy: CostControlPolicy) -> Self {
        self.policies.cost_control = policy;
        self
    }

    /// Clock for budget periods and cache expiry
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Embedder enabling semantic cache lookups
    #[must_use]
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Attach a metrics registry
    #[must_use]
    pub fn metrics(mut self, metrics: GatewayMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the gateway
    ///
    /// # Errors
    /// Returns `InvalidPolicy` if any policy fails validation
    pub fn build(self) -> GatewayResult<PolicyGateway> {
        self.policies.validate().map_err(GatewayError::from)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = PolicyStore::new(self.policies);
        let breakers = Arc::new(CircuitBreakerRegistry::new());

        let mut cache = CacheManager::with_clock(store.caching_handle(), Arc::clone(&clock));
        if let Some(embedder) = self.embedder {
            cache = cache.with_embedder(embedder);
        }

        let gateway = PolicyGateway {
            router: Router::new(store.routing_handle()),
            executor: ResilienceExecutor::new(store.resilience_handle(), Arc::clone(&breakers)),
            budget: BudgetTracker::with_clock(store.cost_control_handle(), clock),
            cache,
            breakers,
            metrics: self.metrics,
            stats: GatewayStats::default(),
            started_at: Utc::now(),
            store,
        };

        let routing = gateway.store.routing();
        info!(
            policy = %routing.name,
            providers = routing.providers.len(),
            default_provider = %routing.default_provider,
            metrics = gateway.metrics.is_some(),
            "Policy gateway built"
        );
        Ok(gateway)
    }
}
