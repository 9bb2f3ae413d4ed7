//! Live policy snapshots.
//!
//! Components hold a [`SharedPolicy`] handle and call `load()` once per
//! operation, so a reload is never observed half-applied.

use crate::caching::CachingPolicy;
use crate::cost::CostControlPolicy;
use crate::error::ConfigResult;
use crate::resilience::ResiliencePolicy;
use crate::routing::RoutingPolicy;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Atomically replaceable policy snapshot
pub type SharedPolicy<T> = Arc<ArcSwap<T>>;

/// Create a shared handle from a policy value
pub fn shared<T>(policy: T) -> SharedPolicy<T> {
    Arc::new(ArcSwap::from_pointee(policy))
}

/// All four policy documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    /// Routing policy
    #[serde(default)]
    pub routing: RoutingPolicy,
    /// Resilience policy
    #[serde(default)]
    pub resilience: ResiliencePolicy,
    /// Caching policy
    #[serde(default)]
    pub caching: CachingPolicy,
    /// Cost control policy
    #[serde(default)]
    pub cost_control: CostControlPolicy,
}

impl PolicySet {
    /// Validate every document
    ///
    /// # Errors
    /// Returns the first validation error
    pub fn validate(&self) -> ConfigResult<()> {
        self.routing.validate()?;
        self.resilience.validate()?;
        self.caching.validate()?;
        self.cost_control.validate()
    }
}

/// Holds the current snapshot of every policy
#[derive(Debug, Clone)]
pub struct PolicyStore {
    routing: SharedPolicy<RoutingPolicy>,
    resilience: SharedPolicy<ResiliencePolicy>,
    caching: SharedPolicy<CachingPolicy>,
    cost_control: SharedPolicy<CostControlPolicy>,
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(PolicySet::default())
    }
}

impl PolicyStore {
    /// Create a store from a policy set
    #[must_use]
    pub fn new(set: PolicySet) -> Self {
        Self {
            routing: shared(set.routing),
            resilience: shared(set.resilience),
            caching: shared(set.caching),
            cost_control: shared(set.cost_control),
        }
    }

    /// Current routing snapshot
    #[must_use]
    pub fn routing(&self) -> Arc<RoutingPolicy> {
        self.routing.load_full()
    }

    /// Current resilience snapshot
    #[must_use]
    pub fn resilience(&self) -> Arc<ResiliencePolicy> {
        self.resilience.load_full()
    }

    /// Current caching snapshot
    #[must_use]
    pub fn caching(&self) -> Arc<CachingPolicy> {
        self.caching.load_full()
    }

    /// Current cost control snapshot
    #[must_use]
    pub fn cost_control(&self) -> Arc<CostControlPolicy> {
        self.cost_control.load_full()
    }

    /// Shared routing handle
    #[must_use]
    pub fn routing_handle(&self) -> SharedPolicy<RoutingPolicy> {
        Arc::clone(&self.routing)
    }

    /// Shared resilience handle
    #[must_use]
    pub fn resilience_handle(&self) -> SharedPolicy<ResiliencePolicy> {
        Arc::clone(&self.resilience)
    }

    /// Shared caching handle
    #[must_use]
    pub fn caching_handle(&self) -> SharedPolicy<CachingPolicy> {
        Arc::clone(&self.caching)
    }

    /// Shared cost control handle
    #[must_use]
    pub fn cost_control_handle(&self) -> SharedPolicy<CostControlPolicy> {
        Arc::clone(&self.cost_control)
    }

    /// Replace the routing policy
    pub fn replace_routing(&self, policy: RoutingPolicy) {
        info!(version = %policy.version, name = %policy.name, "Routing policy replaced");
        self.routing.store(Arc::new(policy));
    }

    /// Replace the resilience policy
    pub fn replace_resilience(&self, policy: ResiliencePolicy) {
        info!(version = %policy.version, name = %policy.name, "Resilience policy replaced");
        self.resilience.store(Arc::new(policy));
    }

    /// Replace the caching policy
    pub fn replace_caching(&self, policy: CachingPolicy) {
        info!(version = %policy.version, "Caching policy replaced");
        self.caching.store(Arc::new(policy));
    }

    /// Replace the cost control policy
    pub fn replace_cost_control(&self, policy: CostControlPolicy) {
        info!(version = %policy.version, "Cost control policy replaced");
        self.cost_control.store(Arc::new(policy));
    }

    /// Replace every policy
    pub fn replace_all(&self, set: PolicySet) {
        self.replace_routing(set.routing);
        self.replace_resilience(set.resilience);
        self.replace_caching(set.caching);
        self.replace_cost_control(set.cost_control);
    }

    /// Copy of the current snapshots
    #[must_use]
    pub fn snapshot(&self) -> PolicySet {
        PolicySet {
            routing: (*self.routing()).clone(),
            resilience: (*self.resilience()).clone(),
            caching: (*self.caching()).clone(),
            cost_control: (*self.cost_control()).clone(),
        }
    }
}
