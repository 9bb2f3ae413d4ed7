//! Test helper utilities for integration tests

use crate::fixtures::policy_set;
use crate::mock_providers::MockUpstream;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use gateway_cache::HashingEmbedder;
use gateway_config::PolicySet;
use gateway_core::{GatewayResult, InferenceRequest, ManualClock};
use gateway_engine::{GatewayOutcome, PolicyGateway};
use gateway_telemetry::GatewayMetrics;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Fixed start time for manual clocks: 2026-03-15 12:00 UTC
pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Gateway wired to a mock upstream and a manual clock
pub struct TestGateway {
    /// Gateway under test
    pub gateway: PolicyGateway,
    /// Scripted upstream
    pub upstream: Arc<MockUpstream>,
    /// Clock shared by the budget tracker and the cache
    pub clock: Arc<ManualClock>,
    /// Cancellation token passed to every request
    pub cancel: CancellationToken,
}

/// Builder for [`TestGateway`]
pub struct TestGatewayBuilder {
    policies: PolicySet,
    upstream: MockUpstream,
    semantic: bool,
    metrics: bool,
}

impl TestGatewayBuilder {
    /// Use these policies
    pub fn policies(mut self, policies: PolicySet) -> Self {
        self.policies = policies;
        self
    }

    /// Adjust the fixture policies in place
    pub fn configure(mut self, f: impl FnOnce(&mut PolicySet)) -> Self {
        f(&mut self.policies);
        self
    }

    /// Use this upstream
    pub fn upstream(mut self, upstream: MockUpstream) -> Self {
        self.upstream = upstream;
        self
    }

    /// Attach the hashing embedder and enable semantic lookups
    pub fn semantic(mut self) -> Self {
        self.semantic = true;
        self
    }

    /// Attach a metrics registry
    pub fn metrics(mut self) -> Self {
        self.metrics = true;
        self
    }

    /// Build the gateway
    pub fn build(mut self) -> TestGateway {
        init_tracing();
        let clock = Arc::new(ManualClock::new(test_start()));

        if self.semantic {
            self.policies.caching.semantic_similarity.enabled = true;
        }
        let mut builder = PolicyGateway::builder()
            .policies(self.policies)
            .clock(clock.clone());
        if self.semantic {
            builder = builder.embedder(Arc::new(HashingEmbedder::default()));
        }
        if self.metrics {
            builder = builder.metrics(GatewayMetrics::new().expect("Failed to create metrics"));
        }

        TestGateway {
            gateway: builder.build().expect("Failed to build gateway"),
            upstream: Arc::new(self.upstream),
            clock,
            cancel: CancellationToken::new(),
        }
    }
}

impl TestGateway {
    /// Start from the fixture policies and an always-succeeding upstream
    pub fn builder() -> TestGatewayBuilder {
        TestGatewayBuilder {
            policies: policy_set(),
            upstream: MockUpstream::new(),
            semantic: false,
            metrics: false,
        }
    }

    /// Gateway with all fixture defaults
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Send a request
    pub async fn send(&self, request: &InferenceRequest) -> GatewayResult<GatewayOutcome> {
        self.gateway
            .handle(request, self.upstream.as_ref(), &self.cancel)
            .await
    }

    /// Send a default request for `query`
    pub async fn query(&self, query: &str) -> GatewayResult<GatewayOutcome> {
        self.send(&InferenceRequest::new(query)).await
    }

    /// Move the shared clock forward
    pub fn advance(&self, by: ChronoDuration) {
        self.clock.advance(by);
    }
}

impl Default for TestGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert two amounts are equal within a tiny tolerance
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
