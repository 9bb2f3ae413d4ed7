//! Routing integration tests
//!
//! Provider selection, complexity rules, pinned providers and fallback
//! planning, both through the router and through the whole gateway.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use gateway_config::{shared, PolicyLoader};
use gateway_core::{CostMode, DEFAULT_ENDPOINT, GatewayError, QueryComplexity};
use gateway_routing::{RouteQuery, RouteReason, Router};
use pretty_assertions::assert_eq;

/// Balanced mode picks the lowest priority number
#[tokio::test]
async fn test_balanced_routing_uses_priority() {
    let router = Router::new(shared(routing_policy()));

    let decision = router.route(&request(SIMPLE_QUERY));

    assert_eq!(decision.provider, "openai");
    assert_eq!(decision.model.as_deref(), Some("gpt-4o"));
    assert_eq!(decision.fallback_chain, vec!["anthropic", "groq"]);
    assert_eq!(
        decision.reason,
        RouteReason::CostQuality {
            mode: CostMode::Balanced
        }
    );
}

/// Complex queries follow the complexity rule and its model preference
#[tokio::test]
async fn test_complex_query_follows_complexity_rule() {
    let router = Router::new(shared(complexity_routing_policy()));

    let decision = router.route(&request(COMPLEX_QUERY));
    assert_eq!(decision.provider, "anthropic");
    assert_eq!(decision.model.as_deref(), Some("claude-3-5-sonnet"));
    assert_eq!(
        decision.reason,
        RouteReason::Complexity {
            complexity: QueryComplexity::Complex
        }
    );
    // No declared chain for anthropic: every other enabled provider in order
    assert_eq!(decision.fallback_chain, vec!["openai", "groq"]);

    // Simple queries have no rule and fall through to cost/quality
    let simple = router.route(&request(SIMPLE_QUERY));
    assert_eq!(simple.provider, "openai");
}

/// A request-level cost mode overrides the policy mode
#[tokio::test]
async fn test_request_cost_mode_overrides_policy() {
    let router = Router::new(shared(routing_policy()));
    let req = request(SIMPLE_QUERY);

    let cheap = router.select(&RouteQuery::from_request(&req).with_cost_mode(CostMode::CostOptimized));
    assert_eq!(cheap.provider, "groq");

    let best = router.select(&RouteQuery::from_request(&req).with_cost_mode(CostMode::QualityOptimized));
    assert_eq!(best.provider, "openai");
}

/// The plan keeps enabled fallbacks only, each with its first model
#[tokio::test]
async fn test_plan_skips_disabled_fallbacks() {
    let mut policy = routing_policy();
    if let Some(anthropic) = policy.providers.get_mut("anthropic") {
        anthropic.enabled = false;
    }
    let router = Router::new(shared(policy));

    let decision = router.route(&request(SIMPLE_QUERY));
    let plan = router.plan(&decision, DEFAULT_ENDPOINT);

    let providers: Vec<_> = plan.candidates.iter().map(|c| c.provider.as_str()).collect();
    assert_eq!(providers, vec!["openai", "groq"]);
    assert_eq!(plan.candidates[1].model.as_deref(), Some("llama-3.1-8b-instant"));
}

/// Same policy and inputs give the same decision every time
#[tokio::test]
async fn test_routing_is_deterministic() {
    let router = Router::new(shared(complexity_routing_policy()));
    let first = router.route(&request(COMPLEX_QUERY));
    for _ in 0..20 {
        assert_eq!(router.route(&request(COMPLEX_QUERY)), first);
    }
}

/// A pinned provider is called directly
#[tokio::test]
async fn test_pinned_provider_is_called() {
    let harness = TestGateway::new();

    let outcome = harness
        .send(&pinned_request(SIMPLE_QUERY, "groq"))
        .await
        .expect("answer");

    assert_eq!(outcome.provider, "groq");
    assert_eq!(outcome.route.reason, RouteReason::Requested);
    assert_eq!(harness.upstream.providers_called(), vec!["groq"]);
}

/// Pinning an unknown provider auto-routes instead of failing
#[tokio::test]
async fn test_unknown_pinned_provider_auto_routes() {
    let harness = TestGateway::new();

    let outcome = harness
        .send(&pinned_request(SIMPLE_QUERY, "mistral"))
        .await
        .expect("answer");
    assert_eq!(outcome.provider, "openai");
}

/// Pinning a disabled provider without fallback is refused
#[tokio::test]
async fn test_disabled_pinned_provider_is_refused() {
    let harness = TestGateway::builder()
        .configure(|p| {
            if let Some(groq) = p.routing.providers.get_mut("groq") {
                groq.enabled = false;
            }
        })
        .build();

    let mut req = pinned_request(SIMPLE_QUERY, "groq");
    req.enable_fallback = false;

    let err = harness.send(&req).await.expect_err("refused");
    assert!(matches!(err, GatewayError::ProviderDisabled { .. }));
    assert_eq!(harness.upstream.calls(), 0);
}

/// Replacing the routing policy takes effect on the next request
#[tokio::test]
async fn test_routing_replacement_applies_immediately() {
    let harness = TestGateway::new();
    assert_eq!(harness.query("first").await.expect("answer").provider, "openai");

    let mut policy = routing_policy();
    policy.default_provider = "anthropic".to_string();
    policy.enable_auto_routing = false;
    harness.gateway.replace_routing(policy).expect("valid policy");

    let outcome = harness.query("second").await.expect("answer");
    assert_eq!(outcome.provider, "anthropic");
    assert_eq!(outcome.route.reason, RouteReason::AutoRoutingDisabled);
}

/// The shipped sample policies route simple queries to the cheap provider
#[tokio::test]
async fn test_sample_policies_route() {
    let set = PolicyLoader::new(sample_policies_dir())
        .try_load_all()
        .await
        .expect("sample policies load");
    let router = Router::new(shared(set.routing));

    let simple = router.route(&request(SIMPLE_QUERY));
    assert_eq!(simple.provider, "groq");
    assert_eq!(simple.model.as_deref(), Some("llama-3.1-8b-instant"));

    let complex = router.route(&request(COMPLEX_QUERY));
    assert_eq!(complex.provider, "anthropic");
    assert_eq!(complex.model.as_deref(), Some("claude-3-5-sonnet"));
    assert_eq!(complex.fallback_chain, vec!["openai"]);
}

/// A mocked outage does not change the routing decision, only the answer
#[tokio::test]
async fn test_route_recorded_even_when_fallback_answers() {
    let harness = TestGateway::builder()
        .upstream(MockUpstream::new().with("openai", Behavior::Fail(gateway_core::UpstreamErrorKind::ServerError)))
        .build();

    let outcome = harness.query(SIMPLE_QUERY).await.expect("fallback");
    assert_eq!(outcome.route.provider, "openai");
    assert_eq!(outcome.provider, "anthropic");
    assert!(outcome.fallback_used);
}
