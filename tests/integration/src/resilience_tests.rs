//! Resilience integration tests
//!
//! Retries, fallback, circuit breakers, timeouts, degradation rules and
//! cancellation, driven through the gateway with scripted upstreams.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use gateway_config::{DegradationAction, DegradationCondition, DegradationRule};
use gateway_core::{GatewayError, UpstreamErrorKind};
use gateway_resilience::{AttemptStatus, CircuitState};
use std::collections::HashMap;
use std::time::Duration;

fn breaker_failures(harness: &TestGateway, provider: &str) -> u32 {
    harness
        .gateway
        .breakers()
        .stats()
        .into_iter()
        .find(|s| s.provider == provider)
        .map_or(0, |s| s.failure_count)
}

/// A transient failure is retried on the same provider
#[tokio::test]
async fn test_transient_failure_retried_on_same_provider() {
    let upstream = MockUpstream::new().with("openai", Behavior::FailTimes(1, UpstreamErrorKind::RateLimited));
    let harness = TestGateway::builder()
        .configure(|p| p.resilience = fast_resilience(3, 5))
        .upstream(upstream)
        .build();

    let outcome = harness.query(SIMPLE_QUERY).await.expect("answer");

    assert_eq!(outcome.provider, "openai");
    assert!(!outcome.fallback_used);
    assert_eq!(outcome.attempts.len(), 1);
    assert_eq!(outcome.attempts[0].calls, 2);
    let attempts: Vec<u32> = harness.upstream.recorded().iter().map(|c| c.attempt).collect();
    assert_eq!(attempts, vec![1, 2]);
}

/// A non-transient failure moves straight to the next candidate
#[tokio::test]
async fn test_permanent_failure_not_retried() {
    let upstream = MockUpstream::new().with("openai", Behavior::Fail(UpstreamErrorKind::Other));
    let harness = TestGateway::builder()
        .configure(|p| p.resilience = fast_resilience(3, 5))
        .upstream(upstream)
        .build();

    let outcome = harness.query(SIMPLE_QUERY).await.expect("fallback");

    assert_eq!(outcome.provider, "anthropic");
    assert_eq!(harness.upstream.providers_called(), vec!["openai", "anthropic"]);
    assert_eq!(
        outcome.attempts[0].status,
        AttemptStatus::Failed {
            category: "upstream_error"
        }
    );
}

/// Every candidate failing reports the last failure and one breaker
/// failure per attempted provider
#[tokio::test]
async fn test_exhaustion_reports_last_failure() {
    let upstream = MockUpstream::new()
        .with("openai", Behavior::Fail(UpstreamErrorKind::Unavailable))
        .with("anthropic", Behavior::Fail(UpstreamErrorKind::ServerError))
        .with("groq", Behavior::Fail(UpstreamErrorKind::Connection));
    let harness = TestGateway::builder()
        .configure(|p| p.resilience = fast_resilience(3, 10))
        .upstream(upstream)
        .build();

    let err = harness.query(SIMPLE_QUERY).await.expect_err("exhausted");

    match err {
        GatewayError::AllCandidatesExhausted { attempted, last } => {
            assert_eq!(attempted, 3);
            assert_eq!(last.category(), "connection_error");
            assert!(last.to_string().contains("groq"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.upstream.calls(), 9);
    for provider in ["openai", "anthropic", "groq"] {
        assert_eq!(breaker_failures(&harness, provider), 1, "{provider}");
    }
}

/// Consecutive failures open the circuit and later requests skip the provider
#[tokio::test]
async fn test_circuit_opens_and_skips_provider() {
    let upstream = MockUpstream::new().with("openai", Behavior::Fail(UpstreamErrorKind::Unavailable));
    let harness = TestGateway::builder()
        .configure(|p| p.resilience = fast_resilience(1, 2))
        .upstream(upstream)
        .build();

    harness.query("first").await.expect("first");
    harness.query("second").await.expect("second");
    assert_eq!(harness.gateway.breakers().state("openai"), CircuitState::Open);
    assert_eq!(harness.upstream.calls_to("openai"), 2);

    let third = harness.query("third").await.expect("third");
    assert_eq!(third.provider, "anthropic");
    assert!(third.fallback_used);
    assert_eq!(third.attempts.len(), 1);
    assert_eq!(harness.upstream.calls_to("openai"), 2);
}

/// After the open timeout one probe is admitted and a success closes the circuit
#[tokio::test]
async fn test_circuit_recovers_after_timeout() {
    let upstream = MockUpstream::new().with("openai", Behavior::Fail(UpstreamErrorKind::Unavailable));
    let harness = TestGateway::builder()
        .configure(|p| p.resilience = fast_resilience(1, 1))
        .upstream(upstream)
        .build();

    harness.query("trip").await.expect("fallback");
    assert_eq!(harness.gateway.breakers().state("openai"), CircuitState::Open);

    harness.upstream.set("openai", Behavior::Succeed);
    tokio::time::sleep(Duration::from_millis(80)).await;

    let outcome = harness.query("probe").await.expect("probe");
    assert_eq!(outcome.provider, "openai");
    assert_eq!(harness.gateway.breakers().state("openai"), CircuitState::Closed);
}

/// With no fallback and the primary circuit open, nothing is called
#[tokio::test]
async fn test_open_primary_without_fallback() {
    let harness = TestGateway::new();
    harness.gateway.breakers().get_or_create("openai").force_open();

    let mut req = request(SIMPLE_QUERY);
    req.enable_fallback = false;
    let err = harness.send(&req).await.expect_err("circuit open");

    assert!(matches!(err, GatewayError::CircuitOpen { ref provider } if provider == "openai"));
    assert_eq!(harness.upstream.calls(), 0);
    assert_eq!(harness.gateway.budget().current_spending().daily, 0.0);

    assert!(harness.gateway.reset_circuit_breaker("openai"));
    assert!(harness.send(&req).await.is_ok());
}

/// A slow provider times out and the next candidate answers
#[tokio::test]
async fn test_slow_provider_times_out() {
    let upstream = MockUpstream::new().with("openai", Behavior::Delay(Duration::from_millis(500)));
    let harness = TestGateway::builder()
        .configure(|p| {
            p.resilience.timeouts.per_provider =
                HashMap::from([("openai".to_string(), Duration::from_millis(20))]);
        })
        .upstream(upstream)
        .build();

    let outcome = harness.query(SIMPLE_QUERY).await.expect("fallback");

    assert_eq!(outcome.provider, "anthropic");
    assert_eq!(
        outcome.attempts[0].status,
        AttemptStatus::Failed { category: "timeout" }
    );
}

/// A matching degradation rule jumps its fallback to the front of the queue
#[tokio::test]
async fn test_degradation_rule_reorders_fallbacks() {
    let upstream = MockUpstream::new().with("openai", Behavior::Fail(UpstreamErrorKind::RateLimited));
    let harness = TestGateway::builder()
        .configure(|p| {
            p.resilience = fast_resilience(1, 5);
            p.resilience.degradation_rules = vec![DegradationRule {
                condition: DegradationCondition::ErrorType,
                threshold: Some("rate_limit".to_string()),
                action: DegradationAction::UseFallback,
                fallback_provider: Some("groq".to_string()),
                fallback_model: Some("llama-3.1-8b-instant".to_string()),
                max_latency: None,
            }];
        })
        .upstream(upstream)
        .build();

    let outcome = harness.query(SIMPLE_QUERY).await.expect("degraded");

    assert_eq!(outcome.provider, "groq");
    assert_eq!(outcome.model.as_deref(), Some("llama-3.1-8b-instant"));
    assert_eq!(harness.upstream.providers_called(), vec!["openai", "groq"]);
}

/// Degradation is ignored when disabled in the policy
#[tokio::test]
async fn test_degradation_disabled() {
    let upstream = MockUpstream::new().with("openai", Behavior::Fail(UpstreamErrorKind::RateLimited));
    let harness = TestGateway::builder()
        .configure(|p| {
            p.resilience = fast_resilience(1, 5);
            p.resilience.enable_graceful_degradation = false;
            p.resilience.degradation_rules = vec![DegradationRule {
                condition: DegradationCondition::ProviderFailure,
                threshold: None,
                action: DegradationAction::UseFallback,
                fallback_provider: Some("groq".to_string()),
                fallback_model: None,
                max_latency: None,
            }];
        })
        .upstream(upstream)
        .build();

    let outcome = harness.query(SIMPLE_QUERY).await.expect("fallback");
    assert_eq!(outcome.provider, "anthropic");
}

/// Cancelling mid-call stops the request and refunds the estimate
#[tokio::test]
async fn test_cancellation_during_call() {
    let upstream = MockUpstream::new().with("openai", Behavior::Delay(Duration::from_secs(5)));
    let harness = TestGateway::builder().upstream(upstream).build();

    let cancel = harness.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    });

    let started = std::time::Instant::now();
    let err = harness.query(SIMPLE_QUERY).await.expect_err("cancelled");

    assert!(matches!(err, GatewayError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(harness.gateway.budget().current_spending().daily.abs() < 1e-12);
    assert_eq!(breaker_failures(&harness, "openai"), 0);
}
