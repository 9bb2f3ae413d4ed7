//! Caching integration tests
//!
//! Exact and semantic hits, key scoping, TTL expiry, eviction order and
//! policy replacement, observed through the gateway.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use chrono::Duration as ChronoDuration;
use gateway_cache::CacheSource;
use gateway_config::EvictionPolicy;
use gateway_core::UpstreamErrorKind;
use std::collections::HashMap;

/// Repeating a request is served from the exact cache
#[tokio::test]
async fn test_repeat_request_served_from_cache() {
    let harness = TestGateway::new();

    let first = harness.query(SIMPLE_QUERY).await.expect("first");
    let second = harness.query(SIMPLE_QUERY).await.expect("second");

    assert!(!first.served_from_cache);
    assert!(second.served_from_cache);
    assert_eq!(second.cache_source, Some(CacheSource::Exact));
    assert_eq!(second.response.content, mock_content("openai", SIMPLE_QUERY));
    assert_eq!(second.estimated_cost, 0.0);
    assert_eq!(harness.upstream.calls(), 1);
}

/// Agent is part of the cache key
#[tokio::test]
async fn test_cache_is_scoped_by_agent() {
    let harness = TestGateway::new();

    harness.send(&agent_request(SIMPLE_QUERY, "coder")).await.expect("coder");
    let other = harness
        .send(&agent_request(SIMPLE_QUERY, "writer"))
        .await
        .expect("writer");

    assert!(!other.served_from_cache);
    assert_eq!(harness.upstream.calls(), 2);
}

/// Provider is part of the cache key
#[tokio::test]
async fn test_cache_is_scoped_by_provider() {
    let harness = TestGateway::new();

    harness.query(SIMPLE_QUERY).await.expect("openai");
    let pinned = harness
        .send(&pinned_request(SIMPLE_QUERY, "anthropic"))
        .await
        .expect("anthropic");

    assert!(!pinned.served_from_cache);
    assert_eq!(pinned.provider, "anthropic");
}

/// Entries expire after their TTL on the shared clock
#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let harness = TestGateway::builder()
        .configure(|p| p.caching.ttl.default_seconds = 60)
        .build();

    harness.query(SIMPLE_QUERY).await.expect("first");
    harness.advance(ChronoDuration::seconds(59));
    assert!(harness.query(SIMPLE_QUERY).await.expect("cached").served_from_cache);

    harness.advance(ChronoDuration::seconds(1));
    assert!(!harness.query(SIMPLE_QUERY).await.expect("expired").served_from_cache);
    assert_eq!(harness.upstream.calls(), 2);
}

/// Per-agent TTL wins over the default
#[tokio::test]
async fn test_per_agent_ttl() {
    let harness = TestGateway::builder()
        .configure(|p| {
            p.caching.ttl.per_agent = HashMap::from([("news".to_string(), 10)]);
        })
        .build();

    harness.send(&agent_request("headlines", "news")).await.expect("news");
    harness.send(&agent_request("headlines", "archive")).await.expect("archive");
    harness.advance(ChronoDuration::seconds(11));

    let news = harness.send(&agent_request("headlines", "news")).await.expect("news again");
    let archive = harness
        .send(&agent_request("headlines", "archive"))
        .await
        .expect("archive again");
    assert!(!news.served_from_cache);
    assert!(archive.served_from_cache);
}

/// A zero TTL entry is already expired on the next lookup
#[tokio::test]
async fn test_zero_ttl_never_hits() {
    let harness = TestGateway::builder()
        .configure(|p| p.caching.ttl.default_seconds = 0)
        .build();

    harness.query(SIMPLE_QUERY).await.expect("first");
    let second = harness.query(SIMPLE_QUERY).await.expect("second");
    assert!(!second.served_from_cache);
    assert_eq!(harness.upstream.calls(), 2);
}

/// Disabled caching always calls upstream
#[tokio::test]
async fn test_disabled_cache_always_calls_upstream() {
    let harness = TestGateway::builder()
        .configure(|p| p.caching.enabled = false)
        .build();

    for _ in 0..3 {
        assert!(!harness.query(SIMPLE_QUERY).await.expect("answer").served_from_cache);
    }
    assert_eq!(harness.upstream.calls(), 3);
    assert_eq!(harness.gateway.cache().stats().lookups, 0);
}

/// LRU: A, B, hit A, C evicts B
#[tokio::test]
async fn test_lru_eviction_through_gateway() {
    let harness = TestGateway::builder()
        .configure(|p| p.caching = caching_policy(2, EvictionPolicy::Lru))
        .build();

    harness.query("query a").await.expect("a");
    harness.query("query b").await.expect("b");
    assert!(harness.query("query a").await.expect("a hit").served_from_cache);
    harness.query("query c").await.expect("c");
    assert_eq!(harness.upstream.calls(), 3);

    assert!(harness.query("query a").await.expect("a kept").served_from_cache);
    assert!(!harness.query("query b").await.expect("b evicted").served_from_cache);
    assert_eq!(harness.gateway.cache().stats().exact.evictions, 2);
}

/// FIFO: the same sequence evicts A instead
#[tokio::test]
async fn test_fifo_eviction_through_gateway() {
    let harness = TestGateway::builder()
        .configure(|p| p.caching = caching_policy(2, EvictionPolicy::Fifo))
        .build();

    harness.query("query a").await.expect("a");
    harness.query("query b").await.expect("b");
    assert!(harness.query("query a").await.expect("a hit").served_from_cache);
    harness.query("query c").await.expect("c");

    assert!(harness.query("query b").await.expect("b kept").served_from_cache);
    assert!(!harness.query("query a").await.expect("a evicted").served_from_cache);
}

/// Near-identical wording hits the semantic store
#[tokio::test]
async fn test_semantic_hit_for_reworded_query() {
    let harness = TestGateway::builder().semantic().build();

    harness
        .query("What is the capital of France?")
        .await
        .expect("first");
    let similar = harness
        .query("what is the CAPITAL of france")
        .await
        .expect("similar");

    assert!(similar.served_from_cache);
    match similar.cache_source {
        Some(CacheSource::Semantic { similarity }) => assert!(similarity > 0.99),
        other => panic!("expected semantic hit, got {other:?}"),
    }

    let unrelated = harness
        .query("Translate good morning into Spanish")
        .await
        .expect("unrelated");
    assert!(!unrelated.served_from_cache);
    assert_eq!(harness.upstream.calls(), 2);
}

/// Semantic matches also expire with the clock
#[tokio::test]
async fn test_semantic_entry_expires() {
    let harness = TestGateway::builder()
        .semantic()
        .configure(|p| p.caching.ttl.default_seconds = 30)
        .build();

    harness.query("What is the capital of France?").await.expect("first");
    harness.advance(ChronoDuration::seconds(31));

    let later = harness
        .query("what is the capital of france")
        .await
        .expect("later");
    assert!(!later.served_from_cache);
}

/// Failed requests leave nothing in the cache
#[tokio::test]
async fn test_failures_are_not_cached() {
    let upstream = MockUpstream::new()
        .with("openai", Behavior::Fail(UpstreamErrorKind::Unavailable))
        .with("anthropic", Behavior::Fail(UpstreamErrorKind::Unavailable))
        .with("groq", Behavior::Fail(UpstreamErrorKind::Unavailable));
    let harness = TestGateway::builder().upstream(upstream).build();

    assert!(harness.query(SIMPLE_QUERY).await.is_err());
    assert_eq!(harness.gateway.cache().stats().exact.entries, 0);
}

/// A response from a fallback provider is cached under the routed key
#[tokio::test]
async fn test_fallback_answer_cached_under_routed_provider() {
    let upstream = MockUpstream::new().with("openai", Behavior::FailTimes(2, UpstreamErrorKind::ServerError));
    let harness = TestGateway::builder().upstream(upstream).build();

    let first = harness.query(SIMPLE_QUERY).await.expect("fallback");
    assert_eq!(first.provider, "anthropic");

    let second = harness.query(SIMPLE_QUERY).await.expect("cached");
    assert!(second.served_from_cache);
    assert_eq!(second.provider, "anthropic");
    assert_eq!(harness.upstream.calls(), 3);
}

/// Sweeping removes expired entries from both stores
#[tokio::test]
async fn test_clear_expired_sweeps_both_stores() {
    let harness = TestGateway::builder()
        .semantic()
        .configure(|p| p.caching.ttl.default_seconds = 30)
        .build();

    harness.query("What is the capital of France?").await.expect("first");
    harness.query("Name three prime numbers").await.expect("second");
    assert_eq!(harness.gateway.cache().stats().exact.entries, 2);

    harness.advance(ChronoDuration::seconds(31));
    assert_eq!(harness.gateway.cache().clear_expired(), 4);

    let stats = harness.gateway.cache().stats();
    assert_eq!(stats.exact.entries, 0);
    assert_eq!(stats.semantic.entries, 0);
}

/// Clearing and replacing the caching policy both drop entries
#[tokio::test]
async fn test_clear_and_replace_drop_entries() {
    let harness = TestGateway::new();

    harness.query(SIMPLE_QUERY).await.expect("first");
    harness.gateway.clear_caches();
    assert!(!harness.query(SIMPLE_QUERY).await.expect("after clear").served_from_cache);

    harness
        .gateway
        .replace_caching(caching_policy(10, EvictionPolicy::Lfu))
        .expect("valid caching policy");
    assert!(!harness.query(SIMPLE_QUERY).await.expect("after replace").served_from_cache);
    assert_eq!(
        harness.gateway.cache().stats().exact.eviction_policy,
        EvictionPolicy::Lfu.to_string()
    );
    assert_eq!(harness.upstream.calls(), 3);
}
