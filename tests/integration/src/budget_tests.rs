//! Budget integration tests
//!
//! Spend caps, budget periods on the manual clock, token ceilings, usage
//! reconciliation and the cheaper-model re-route.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use chrono::Duration as ChronoDuration;
use gateway_core::{GatewayError, TokenUsage};
use gateway_cost::BudgetPeriod;
use std::time::Duration;

/// Estimated cost of a short query on openai gpt-4o with 4000 output tokens
fn gpt4o_estimate(query: &str) -> f64 {
    let input = gateway_cost::estimate_tokens(query);
    f64::from(input) / 1000.0 * 0.0025 + 4000.0 / 1000.0 * 0.01
}

/// Over the per-request cap: refused before any call, ledger untouched
#[tokio::test]
async fn test_per_request_cap_refuses_without_calling() {
    let harness = TestGateway::builder()
        .configure(|p| p.cost_control = cost_policy(100.0, 0.01))
        .metrics()
        .build();

    let err = harness.query(SIMPLE_QUERY).await.expect_err("over cap");

    assert!(matches!(err, GatewayError::BudgetExceeded { .. }));
    assert!(err.is_client_error());
    assert_eq!(harness.upstream.calls(), 0);
    assert_eq!(harness.gateway.budget().current_spending().daily, 0.0);

    let metrics = harness.gateway.metrics().expect("metrics attached");
    let text = metrics.render().expect("render");
    assert!(text.contains("gateway_budget_rejections_total{reason=\"per_request\"} 1"));
    assert_eq!(metrics.requests_total("budget_exceeded"), 1);
}

/// The daily cap holds across requests and reopens on the next budget day
#[tokio::test]
async fn test_daily_cap_and_rollover() {
    let harness = TestGateway::builder()
        .configure(|p| p.cost_control = cost_policy(0.05, 1.0))
        .upstream(MockUpstream::new().without_usage())
        .build();

    harness.query("first").await.expect("first fits");
    let err = harness.query("second").await.expect_err("daily cap");
    assert!(err.to_string().contains("daily budget exceeded"));
    assert_eq!(harness.upstream.calls(), 1);

    let spent = harness.gateway.budget().current_spending();
    assert_close(spent.daily, gpt4o_estimate("first"));
    assert!(spent.daily <= 0.05);

    // 12:00 + 12h is midnight, the default reset hour
    harness.advance(ChronoDuration::hours(12));
    harness.query("third").await.expect("new day");

    let spent = harness.gateway.budget().current_spending();
    assert_close(spent.daily, gpt4o_estimate("third"));
    assert_close(spent.monthly, gpt4o_estimate("first") + gpt4o_estimate("third"));
}

/// A non-zero reset hour shifts the budget day boundary
#[tokio::test]
async fn test_reset_hour_moves_day_boundary() {
    let harness = TestGateway::builder()
        .configure(|p| {
            p.cost_control = cost_policy(0.05, 1.0);
            p.cost_control.budget.reset_hour = 6;
        })
        .upstream(MockUpstream::new().without_usage())
        .build();

    harness.query("first").await.expect("first fits");

    harness.advance(ChronoDuration::hours(17));
    assert!(harness.query("before reset").await.is_err());

    harness.advance(ChronoDuration::hours(1));
    harness.query("after reset").await.expect("new budget day");
}

/// The monthly cap spans days and reopens in the next month
#[tokio::test]
async fn test_monthly_cap() {
    let harness = TestGateway::builder()
        .configure(|p| p.cost_control.budget.monthly_limit = 0.05)
        .upstream(MockUpstream::new().without_usage())
        .build();

    harness.query("march one").await.expect("fits");
    harness.advance(ChronoDuration::days(1));
    let err = harness.query("march two").await.expect_err("monthly cap");
    assert!(err.to_string().contains("monthly budget exceeded"));

    harness.advance(ChronoDuration::days(20));
    harness.query("april").await.expect("new month");
}

/// Token ceilings refuse oversized requests before any spend
#[tokio::test]
async fn test_token_limits() {
    let harness = TestGateway::builder()
        .configure(|p| p.cost_control.token_limits.max_input_tokens = 5)
        .build();

    let err = harness.query(COMPLEX_QUERY).await.expect_err("too long");
    assert!(matches!(err, GatewayError::TokenLimitExceeded { .. }));
    assert_eq!(err.category(), "token_limit_exceeded");

    let harness = TestGateway::builder()
        .configure(|p| p.cost_control.token_limits.max_total_tokens = 4001)
        .build();

    let err = harness.query(SIMPLE_QUERY).await.expect_err("total over");
    assert!(err.to_string().contains("total tokens"));
    assert_eq!(harness.upstream.calls(), 0);
    assert_eq!(harness.gateway.budget().current_spending().daily, 0.0);

    // Disabled limits let the same request through
    harness
        .gateway
        .replace_cost_control({
            let mut policy = cost_policy(100.0, 1.0);
            policy.token_limits.enabled = false;
            policy.token_limits.max_total_tokens = 4001;
            policy
        })
        .expect("valid cost policy");
    assert!(harness.query(SIMPLE_QUERY).await.is_ok());
}

/// Reported usage replaces the estimate in the ledger
#[tokio::test]
async fn test_spend_reconciled_to_usage() {
    let harness = TestGateway::new();

    let outcome = harness.query(SIMPLE_QUERY).await.expect("answer");

    assert_close(outcome.estimated_cost, gpt4o_estimate(SIMPLE_QUERY));
    // 50 input + 100 output tokens on gpt-4o
    let actual = outcome.actual_cost.expect("usage reported");
    assert_close(actual, 0.001_125);
    assert_close(harness.gateway.budget().current_spending().daily, 0.001_125);

    // A cache hit costs nothing
    let cached = harness.query(SIMPLE_QUERY).await.expect("cached");
    assert!(cached.served_from_cache);
    assert_close(harness.gateway.budget().current_spending().daily, 0.001_125);
}

/// A request that settles after the budget day rolls over reconciles
/// against the day it was charged to, not the new one
#[tokio::test]
async fn test_reconcile_after_rollover_keeps_new_day() {
    let harness = TestGateway::builder()
        .upstream(MockUpstream::new().with("openai", Behavior::Delay(Duration::from_millis(200))))
        .build();

    let (slow, fast) = tokio::join!(harness.query(SIMPLE_QUERY), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        // 12:00 + 12h is midnight, the default reset hour
        harness.advance(ChronoDuration::hours(12));
        harness.send(&pinned_request("next day question", "anthropic")).await
    });
    let slow = slow.expect("slow answer");
    let fast = fast.expect("fast answer");

    let fast_cost = fast.actual_cost.expect("usage reported");
    let slow_cost = slow.actual_cost.expect("usage reported");
    let spent = harness.gateway.budget().current_spending();
    assert_close(spent.daily, fast_cost);
    assert_close(spent.monthly, slow_cost + fast_cost);
}

/// Usage above the estimate is charged on top
#[tokio::test]
async fn test_usage_above_estimate_is_charged() {
    let harness = TestGateway::builder()
        .upstream(MockUpstream::new().with_usage(TokenUsage::new(1000, 5000)))
        .build();

    let outcome = harness.query(SIMPLE_QUERY).await.expect("answer");

    let expected = 1000.0 / 1000.0 * 0.0025 + 5000.0 / 1000.0 * 0.01;
    assert_close(outcome.actual_cost.expect("usage reported"), expected);
    assert_close(harness.gateway.budget().current_spending().daily, expected);
}

/// Expensive routes move to a cheaper provider that meets the quality bar
#[tokio::test]
async fn test_cheaper_model_reroute() {
    let harness = TestGateway::builder()
        .configure(|p| p.cost_control.cost_routing.enabled = true)
        .build();

    let outcome = harness.query(SIMPLE_QUERY).await.expect("answer");

    assert!(outcome.cost_rerouted);
    assert_eq!(outcome.provider, "groq");
    assert_eq!(outcome.route.provider, "groq");
    assert_eq!(outcome.model.as_deref(), Some("llama-3.1-8b-instant"));
    assert!(outcome.estimated_cost < gpt4o_estimate(SIMPLE_QUERY));
    assert_eq!(harness.upstream.providers_called(), vec!["groq"]);
}

/// No re-route when the cheaper provider misses the quality bar or the
/// request pins a provider
#[tokio::test]
async fn test_reroute_respects_quality_and_pins() {
    let harness = TestGateway::builder()
        .configure(|p| {
            p.cost_control.cost_routing.enabled = true;
            p.cost_control.cost_routing.quality_threshold = 0.8;
        })
        .build();
    let outcome = harness.query(SIMPLE_QUERY).await.expect("answer");
    assert!(!outcome.cost_rerouted);
    assert_eq!(outcome.provider, "openai");

    let harness = TestGateway::builder()
        .configure(|p| p.cost_control.cost_routing.enabled = true)
        .build();
    let outcome = harness
        .send(&pinned_request(SIMPLE_QUERY, "anthropic"))
        .await
        .expect("answer");
    assert!(!outcome.cost_rerouted);
    assert_eq!(outcome.provider, "anthropic");
}

/// Resetting the daily period keeps the monthly total
#[tokio::test]
async fn test_reset_daily_budget() {
    let harness = TestGateway::builder()
        .configure(|p| p.cost_control = cost_policy(0.05, 1.0))
        .upstream(MockUpstream::new().without_usage())
        .build();

    harness.query("first").await.expect("fits");
    assert!(harness.query("second").await.is_err());

    harness.gateway.reset_budget(BudgetPeriod::Daily);
    let spent = harness.gateway.budget().current_spending();
    assert_eq!(spent.daily, 0.0);
    assert_close(spent.monthly, gpt4o_estimate("first"));

    harness.query("third").await.expect("after reset");
}

/// A disabled budget never refuses
#[tokio::test]
async fn test_disabled_budget() {
    let harness = TestGateway::builder()
        .configure(|p| {
            p.cost_control = cost_policy(0.0, 0.0);
            p.cost_control.budget.enabled = false;
        })
        .build();

    for query in ["one", "two", "three"] {
        assert!(harness.query(query).await.is_ok());
    }
    assert_eq!(harness.gateway.budget().current_spending().daily, 0.0);
}
