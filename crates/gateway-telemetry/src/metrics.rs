//! Prometheus metrics.
//!
//! All gateway metrics live in one [`Registry`] owned by [`GatewayMetrics`],
//! so several gateways in one process (tests, simulations) never collide.

use crate::error::TelemetryError;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

/// Gateway metric set
#[derive(Debug, Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    cache_lookups: IntCounterVec,
    upstream_attempts: IntCounterVec,
    budget_rejections: IntCounterVec,
    requests: IntCounterVec,
    request_duration: HistogramVec,
    budget_spend: GaugeVec,
    circuit_state: IntGaugeVec,
}

impl GatewayMetrics {
    /// Create metrics in a fresh registry
    ///
    /// # Errors
    /// Returns error if a metric cannot be created or registered
    pub fn new() -> Result<Self, TelemetryError> {
        Self::with_registry(Registry::new())
    }

    /// Create metrics in an existing registry
    ///
    /// # Errors
    /// Returns error if a metric cannot be created or registered
    pub fn with_registry(registry: Registry) -> Result<Self, TelemetryError> {
        let cache_lookups = IntCounterVec::new(
            Opts::new("gateway_cache_lookups_total", "Cache lookups by result"),
            &["result"],
        )?;
        let upstream_attempts = IntCounterVec::new(
            Opts::new("gateway_upstream_attempts_total", "Upstream calls by provider and outcome"),
            &["provider", "outcome"],
        )?;
        let budget_rejections = IntCounterVec::new(
            Opts::new("gateway_budget_rejections_total", "Requests refused by the budget"),
            &["reason"],
        )?;
        let requests = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Requests by outcome"),
            &["outcome"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new("gateway_request_duration_seconds", "Request duration")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["outcome"],
        )?;
        let budget_spend = GaugeVec::new(
            Opts::new("gateway_budget_spend_usd", "Spend in the current budget period"),
            &["period"],
        )?;
        let circuit_state = IntGaugeVec::new(
            Opts::new(
                "gateway_circuit_state",
                "Circuit breaker state (0=closed, 1=open, 2=half-open)",
            ),
            &["provider"],
        )?;

        registry.register(Box::new(cache_lookups.clone()))?;
        registry.register(Box::new(upstream_attempts.clone()))?;
        registry.register(Box::new(budget_rejections.clone()))?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(budget_spend.clone()))?;
        registry.register(Box::new(circuit_state.clone()))?;

        Ok(Self {
            registry,
            cache_lookups,
            upstream_attempts,
            budget_rejections,
            requests,
            request_duration,
            budget_spend,
            circuit_state,
        })
    }

    /// Underlying registry
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count a cache lookup; `result` is `exact`, `semantic` or `miss`
    pub fn record_cache_lookup(&self, result: &str) {
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    /// Count one upstream call
    pub fn record_upstream_attempt(&self, provider: &str, outcome: &str) {
        self.upstream_attempts
            .with_label_values(&[provider, outcome])
            .inc();
    }

    /// Count a budget rejection
    pub fn record_budget_rejection(&self, reason: &str) {
        self.budget_rejections.with_label_values(&[reason]).inc();
    }

    /// Count a finished request and observe its duration
    pub fn record_request(&self, outcome: &str, duration_secs: f64) {
        self.requests.with_label_values(&[outcome]).inc();
        self.request_duration
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }

    /// Publish current spend for a period
    pub fn set_budget_spend(&self, period: &str, amount: f64) {
        self.budget_spend.with_label_values(&[period]).set(amount);
    }

    /// Publish a breaker state
    pub fn set_circuit_state(&self, provider: &str, state: i64) {
        self.circuit_state.with_label_values(&[provider]).set(state);
    }

    /// Current value of a request counter
    #[must_use]
    pub fn requests_total(&self, outcome: &str) -> u64 {
        self.requests.with_label_values(&[outcome]).get()
    }

    /// Current value of a cache lookup counter
    #[must_use]
    pub fn cache_lookups_total(&self, result: &str) -> u64 {
        self.cache_lookups.with_label_values(&[result]).get()
    }

    /// Current value of an upstream attempt counter
    #[must_use]
    pub fn upstream_attempts_total(&self, provider: &str, outcome: &str) -> u64 {
        self.upstream_attempts
            .with_label_values(&[provider, outcome])
            .get()
    }

    /// Text exposition of every metric
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn render(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
