//! Test fixtures and sample policies for integration tests

use gateway_config::{
    BackoffType, CachingPolicy, CircuitBreakerConfig, ComplexityRule, CostControlPolicy,
    EvictionPolicy, PolicySet, PricingEntry, ProviderConfig, ResiliencePolicy, RetryStrategy,
    RoutingPolicy, Tier,
};
use gateway_core::{InferenceRequest, QueryComplexity};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// A query that classifies as simple
pub const SIMPLE_QUERY: &str = "What is the capital of France?";

/// A query that classifies as complex
pub const COMPLEX_QUERY: &str = "Please analyze the architecture of a distributed event \
    sourcing system and compare the trade-offs of snapshotting strategies for read models";

/// Directory with the sample policy documents shipped in the repository
pub fn sample_policies_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../policies")
}

/// Three providers: openai (primary), anthropic and groq
pub fn routing_policy() -> RoutingPolicy {
    RoutingPolicy::empty("openai")
        .with_provider(
            "openai",
            ProviderConfig::new(1, ["gpt-4o", "gpt-4o-mini"])
                .with_cost_tier(Tier::Medium)
                .with_quality_tier(Tier::High),
        )
        .with_provider(
            "anthropic",
            ProviderConfig::new(2, ["claude-3-5-sonnet", "claude-3-haiku"])
                .with_cost_tier(Tier::Medium)
                .with_quality_tier(Tier::High),
        )
        .with_provider(
            "groq",
            ProviderConfig::new(3, ["llama-3.1-8b-instant"])
                .with_cost_tier(Tier::Low)
                .with_quality_tier(Tier::Medium),
        )
        .with_fallback_chain("openai", ["anthropic", "groq"])
}

/// Routing policy with complexity rules sending complex queries to anthropic
pub fn complexity_routing_policy() -> RoutingPolicy {
    let mut policy = routing_policy();
    policy.complexity_rules = vec![ComplexityRule {
        complexity: QueryComplexity::Complex,
        provider_preference: vec!["anthropic".to_string(), "openai".to_string()],
        model_preference: IndexMap::from([(
            "anthropic".to_string(),
            "claude-3-5-sonnet".to_string(),
        )]),
    }];
    policy
}

/// Retry strategy with millisecond delays
pub fn fast_retry(max_attempts: u32) -> RetryStrategy {
    RetryStrategy {
        max_attempts,
        backoff_type: BackoffType::Fixed,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        ..Default::default()
    }
}

/// Resilience policy that retries quickly and trips breakers after
/// `failure_threshold` failures
pub fn fast_resilience(max_attempts: u32, failure_threshold: u32) -> ResiliencePolicy {
    ResiliencePolicy {
        retry_strategies: HashMap::from([("default".to_string(), fast_retry(max_attempts))]),
        circuit_breakers: HashMap::from([(
            "default".to_string(),
            CircuitBreakerConfig {
                failure_threshold,
                success_threshold: 1,
                timeout: Duration::from_millis(50),
                half_open_max_calls: 1,
            },
        )]),
        ..Default::default()
    }
}

/// Caching policy with the given entry budget and eviction policy
pub fn caching_policy(max_entries: usize, eviction: EvictionPolicy) -> CachingPolicy {
    let mut policy = CachingPolicy::default();
    policy.size_limits.max_entries = max_entries;
    policy.size_limits.eviction_policy = eviction;
    policy.semantic_similarity.enabled = false;
    policy
}

/// Cost policy pricing every fixture model; cost routing disabled
pub fn cost_policy(daily_limit: f64, per_request_limit: f64) -> CostControlPolicy {
    let mut policy = CostControlPolicy::default();
    policy.budget.daily_limit = daily_limit;
    policy.budget.monthly_limit = daily_limit * 30.0;
    policy.budget.per_request_limit = per_request_limit;
    policy.cost_routing.enabled = false;
    policy.pricing = vec![
        PricingEntry::new("openai", "gpt-4o", 0.0025, 0.01),
        PricingEntry::new("openai", "gpt-4o-mini", 0.000_15, 0.000_6),
        PricingEntry::new("anthropic", "claude-3-5-sonnet", 0.003, 0.015),
        PricingEntry::new("anthropic", "claude-3-haiku", 0.000_25, 0.001_25),
        PricingEntry::new("groq", "llama-3.1-8b-instant", 0.000_05, 0.000_08),
    ];
    policy
}

/// The standard fixture policy set
pub fn policy_set() -> PolicySet {
    PolicySet {
        routing: routing_policy(),
        resilience: fast_resilience(2, 5),
        caching: caching_policy(100, EvictionPolicy::Lru),
        cost_control: cost_policy(100.0, 1.0),
    }
}

/// A request for `query` with all other fields defaulted
pub fn request(query: &str) -> InferenceRequest {
    InferenceRequest::new(query)
}

/// A request pinned to a provider
pub fn pinned_request(query: &str, provider: &str) -> InferenceRequest {
    InferenceRequest::builder()
        .query(query)
        .provider(provider)
        .build()
        .expect("Failed to build request")
}

/// A request from a named agent
pub fn agent_request(query: &str, agent: &str) -> InferenceRequest {
    InferenceRequest::builder()
        .query(query)
        .agent(agent)
        .build()
        .expect("Failed to build request")
}
