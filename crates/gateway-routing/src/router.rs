//! Provider and model selection.
//!
//! The router is a pure function of the current routing snapshot and the
//! request. It never fails: when nothing else matches it returns the
//! configured default provider.

use crate::complexity::classify_complexity;
use gateway_config::{ProviderConfig, RoutingPolicy, SharedPolicy};
use gateway_core::{Candidate, CostMode, ExecutionPlan, InferenceRequest, QueryComplexity};
use serde::Serialize;
use std::cmp::Reverse;
use std::fmt;
use tracing::debug;

/// Why a provider was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteReason {
    /// The caller asked for this provider
    Requested,
    /// Auto-routing is disabled
    AutoRoutingDisabled,
    /// A complexity rule matched
    Complexity {
        /// Detected complexity
        complexity: QueryComplexity,
    },
    /// Cost/quality trade-off
    CostQuality {
        /// Effective mode
        mode: CostMode,
    },
    /// Nothing matched
    Default,
}

impl fmt::Display for RouteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("requested"),
            Self::AutoRoutingDisabled => f.write_str("auto_routing_disabled"),
            Self::Complexity { complexity } => write!(f, "complexity:{complexity}"),
            Self::CostQuality { mode } => write!(f, "cost_quality:{mode}"),
            Self::Default => f.write_str("default"),
        }
    }
}

/// Result of provider selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDecision {
    /// Primary provider
    pub provider: String,
    /// Model for the primary provider
    pub model: Option<String>,
    /// Providers to try after the primary
    pub fallback_chain: Vec<String>,
    /// Which rule produced the decision
    pub reason: RouteReason,
}

/// Inputs to provider selection
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteQuery<'a> {
    /// Explicitly requested provider
    pub requested_provider: Option<&'a str>,
    /// Explicitly requested model
    pub requested_model: Option<&'a str>,
    /// Query text
    pub query: &'a str,
    /// Agent name
    pub agent: &'a str,
    /// Requested mode; the policy mode applies when `None`
    pub cost_mode: Option<CostMode>,
    /// Whether a fallback chain is wanted
    pub want_fallback: bool,
}

impl<'a> RouteQuery<'a> {
    /// Build a query from an inbound request
    #[must_use]
    pub fn from_request(request: &'a InferenceRequest) -> Self {
        Self {
            requested_provider: request.requested_provider.as_deref(),
            requested_model: request.requested_model.as_deref(),
            query: &request.query,
            agent: &request.agent,
            cost_mode: request.cost_mode,
            want_fallback: request.enable_fallback,
        }
    }

    /// Override the cost mode
    #[must_use]
    pub fn with_cost_mode(mut self, mode: CostMode) -> Self {
        self.cost_mode = Some(mode);
        self
    }
}

/// Policy driven router
#[derive(Debug, Clone)]
pub struct Router {
    policy: SharedPolicy<RoutingPolicy>,
}

impl Router {
    /// Create a router reading from a shared routing policy
    #[must_use]
    pub fn new(policy: SharedPolicy<RoutingPolicy>) -> Self {
        Self { policy }
    }

    /// Select a provider for an inbound request
    #[must_use]
    pub fn route(&self, request: &InferenceRequest) -> RouteDecision {
        self.select(&RouteQuery::from_request(request))
    }

    /// Select provider, model and fallback chain
    #[must_use]
    pub fn select(&self, query: &RouteQuery<'_>) -> RouteDecision {
        let policy = self.policy.load();
        let decision = select_with_policy(&policy, query);
        debug!(
            provider = %decision.provider,
            model = ?decision.model,
            fallbacks = ?decision.fallback_chain,
            reason = %decision.reason,
            "Route selected"
        );
        decision
    }

    /// Turn a decision into executor candidates.
    ///
    /// Fallbacks get their first configured model. Fallbacks that are unknown
    /// or disabled in the current policy are dropped.
    #[must_use]
    pub fn plan(&self, decision: &RouteDecision, endpoint: &str) -> ExecutionPlan {
        let policy = self.policy.load();
        let primary_timeout = policy.providers.get(&decision.provider).and_then(|p| p.timeout);

        let mut candidates = vec![Candidate::new(decision.provider.clone(), decision.model.clone())
            .with_timeout_hint(primary_timeout)];

        for name in &decision.fallback_chain {
            match policy.enabled_provider(name) {
                Some(config) => candidates.push(
                    Candidate::new(name.clone(), config.first_model().map(String::from))
                        .with_timeout_hint(config.timeout),
                ),
                None => debug!(provider = %name, "Skipping unavailable fallback provider"),
            }
        }

        ExecutionPlan::new(endpoint, candidates)
    }

    /// Routing snapshot currently in effect
    #[must_use]
    pub fn policy(&self) -> std::sync::Arc<RoutingPolicy> {
        self.policy.load_full()
    }
}

/// Selection against an explicit policy snapshot
#[must_use]
pub fn select_with_policy(policy: &RoutingPolicy, query: &RouteQuery<'_>) -> RouteDecision {
    let requested_model = query.requested_model.map(String::from);
    let decide = |provider: &str, model: Option<String>, reason: RouteReason| RouteDecision {
        provider: provider.to_string(),
        model,
        fallback_chain: if query.want_fallback {
            fallback_chain(policy, provider)
        } else {
            Vec::new()
        },
        reason,
    };

    if let Some(requested) = query.requested_provider {
        let name = requested.to_lowercase();
        if let Some(config) = policy.enabled_provider(&name) {
            let model = requested_model.clone().or_else(|| first_model(config));
            return decide(&name, model, RouteReason::Requested);
        }
        debug!(provider = %name, "Requested provider unavailable, auto-routing");
    }

    if !policy.enable_auto_routing {
        return default_decision(policy, requested_model, RouteReason::AutoRoutingDisabled, decide);
    }

    let complexity = classify_complexity(query.query);
    if let Some((provider, model)) = apply_complexity_rules(policy, complexity, query.requested_model) {
        return decide(provider, model, RouteReason::Complexity { complexity });
    }

    let mode = query.cost_mode.unwrap_or(policy.cost_quality.mode);
    if let Some((provider, model)) = apply_cost_quality(policy, mode, query.requested_model) {
        return decide(provider, model, RouteReason::CostQuality { mode });
    }

    default_decision(policy, requested_model, RouteReason::Default, decide)
}

fn default_decision<F>(
    policy: &RoutingPolicy,
    requested_model: Option<String>,
    reason: RouteReason,
    decide: F,
) -> RouteDecision
where
    F: Fn(&str, Option<String>, RouteReason) -> RouteDecision,
{
    let provider = policy.default_provider.as_str();
    let model = requested_model
        .or_else(|| policy.default_model.clone())
        .or_else(|| policy.providers.get(provider).and_then(first_model));
    decide(provider, model, reason)
}

fn first_model(config: &ProviderConfig) -> Option<String> {
    config.first_model().map(String::from)
}

fn apply_complexity_rules<'p>(
    policy: &'p RoutingPolicy,
    complexity: QueryComplexity,
    requested_model: Option<&str>,
) -> Option<(&'p str, Option<String>)> {
    policy
        .complexity_rules
        .iter()
        .filter(|rule| rule.complexity == complexity)
        .find_map(|rule| {
            rule.provider_preference.iter().find_map(|name| {
                let config = policy.enabled_provider(name)?;
                let model = rule
                    .model_preference
                    .get(name)
                    .cloned()
                    .or_else(|| requested_model.map(String::from))
                    .or_else(|| first_model(config));
                Some((name.as_str(), model))
            })
        })
}

fn apply_cost_quality<'p>(
    policy: &'p RoutingPolicy,
    mode: CostMode,
    requested_model: Option<&str>,
) -> Option<(&'p str, Option<String>)> {
    if let Some(mapping) = policy.cost_quality.provider_mapping.get(&mode) {
        let mapped = mapping.iter().find_map(|(name, model)| {
            policy.enabled_provider(name)?;
            let model = if model.is_empty() {
                requested_model.map(String::from)
            } else {
                Some(model.clone())
            };
            Some((name.as_str(), model))
        });
        if mapped.is_some() {
            return mapped;
        }
    }

    let mut ranked: Vec<(&String, &ProviderConfig)> = policy.enabled_providers().collect();
    // Stable sort keeps configuration order among equal keys
    match mode {
        CostMode::CostOptimized => ranked.sort_by_key(|(_, c)| c.cost_tier.rank()),
        CostMode::QualityOptimized => ranked.sort_by_key(|(_, c)| Reverse(c.quality_tier.rank())),
        CostMode::Balanced => ranked.sort_by_key(|(_, c)| c.priority),
    }

    ranked.first().map(|(name, config)| {
        let model = requested_model.map(String::from).or_else(|| first_model(config));
        (name.as_str(), model)
    })
}

/// Fallback providers for `provider`: the first matching declared chain, or
/// every other enabled provider in configuration order
#[must_use]
pub fn fallback_chain(policy: &RoutingPolicy, provider: &str) -> Vec<String> {
    if let Some(chain) = policy.fallback_chains.iter().find(|c| c.primary == provider) {
        return chain.fallbacks.clone();
    }

    policy
        .enabled_providers()
        .filter(|(name, _)| name.as_str() != provider)
        .map(|(name, _)| name.clone())
        .collect()
}
