//! Circuit breaker pattern implementation.
//!
//! The circuit breaker prevents cascading failures by stopping requests
//! to a failing provider and allowing it time to recover. One breaker exists
//! per provider; breakers are created lazily through
//! [`CircuitBreakerRegistry::get_or_create`] and live as long as the registry.
//!
//! Callers that hold a call across an await point should take a
//! [`BreakerPermit`] through [`CircuitBreakerRegistry::acquire`]: a half-open
//! probe that is never settled gives its slot back when the permit drops.

use dashmap::DashMap;
use gateway_config::CircuitBreakerConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, testing if the provider recovered
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used for gauges
    #[must_use]
    pub fn as_gauge(self) -> i64 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        })
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    half_open_calls: u32,
    last_failure_time: Option<Instant>,
    /// Bumped on every entry into `HalfOpen` and on close, so a probe from an
    /// earlier half-open period cannot release a slot in the current one
    epoch: u64,
}

impl BreakerState {
    const fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            half_open_calls: 0,
            last_failure_time: None,
            epoch: 0,
        }
    }

    fn close(&mut self) {
        let epoch = self.epoch.wrapping_add(1);
        *self = Self { epoch, ..Self::closed() };
    }
}

/// How a call was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// No probe slot taken
    Free,
    /// Took a half-open probe slot in the given epoch
    Probe(u64),
}

/// Circuit breaker for a single provider.
///
/// Thresholds are passed on every call so a policy reload takes effect
/// without recreating breakers.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: String,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            inner: Mutex::new(BreakerState::closed()),
        }
    }

    /// Provider this breaker guards
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Whether a call may proceed now.
    ///
    /// In `Open`, the first call after `timeout` has elapsed since the last
    /// failure moves the breaker to `HalfOpen` with the probe counter at zero
    /// and is itself let through. In `HalfOpen`, up to `half_open_max_calls`
    /// further probes are let through.
    ///
    /// A probe admitted here is only released by a recorded outcome; prefer
    /// [`CircuitBreaker::acquire`] when the call may be abandoned.
    pub fn can_attempt(&self, config: &CircuitBreakerConfig) -> bool {
        self.admit(config).is_some()
    }

    /// Admit a call and hand back a permit that settles it.
    ///
    /// Returns `None` when the breaker rejects the call.
    pub fn acquire(self: &Arc<Self>, config: &CircuitBreakerConfig) -> Option<BreakerPermit> {
        let probe_epoch = match self.admit(config)? {
            Admission::Free => None,
            Admission::Probe(epoch) => Some(epoch),
        };
        Some(BreakerPermit {
            breaker: Arc::clone(self),
            probe_epoch,
        })
    }

    fn admit(&self, config: &CircuitBreakerConfig) -> Option<Admission> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Some(Admission::Free),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_time
                    .map_or(Duration::MAX, |at| at.elapsed());
                if elapsed < config.timeout {
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                inner.half_open_calls = 0;
                inner.success_count = 0;
                inner.epoch = inner.epoch.wrapping_add(1);
                info!(provider = %self.provider, "Circuit breaker half-open, testing");
                Some(Admission::Free)
            }
            CircuitState::HalfOpen => {
                if inner.half_open_calls >= config.half_open_max_calls {
                    debug!(
                        provider = %self.provider,
                        calls = inner.half_open_calls,
                        "Circuit breaker half-open probe limit reached"
                    );
                    return None;
                }
                inner.half_open_calls += 1;
                Some(Admission::Probe(inner.epoch))
            }
        }
    }

    /// Give back a probe slot that was never settled
    fn release_probe(&self, epoch: u64) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.epoch == epoch {
            inner.half_open_calls = inner.half_open_calls.saturating_sub(1);
            debug!(
                provider = %self.provider,
                calls = inner.half_open_calls,
                "Circuit breaker half-open probe released"
            );
        }
    }

    /// Record a successful call
    pub fn record_success(&self, config: &CircuitBreakerConfig) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                debug!(
                    provider = %self.provider,
                    successes = inner.success_count,
                    threshold = config.success_threshold,
                    "Circuit breaker half-open success"
                );
                if inner.success_count >= config.success_threshold {
                    inner.close();
                    info!(provider = %self.provider, "Circuit breaker closed");
                }
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened; the open period stands
            }
        }
    }

    /// Record a failed call
    pub fn record_failure(&self, config: &CircuitBreakerConfig) {
        let mut inner = self.inner.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_time = Some(Instant::now());

        let reopen = match inner.state {
            CircuitState::Closed => {
                let tripped = inner.failure_count >= config.failure_threshold;
                if tripped {
                    debug!(
                        provider = %self.provider,
                        failures = inner.failure_count,
                        threshold = config.failure_threshold,
                        "Circuit breaker failure threshold reached"
                    );
                }
                tripped
            }
            CircuitState::HalfOpen => {
                debug!(provider = %self.provider, "Circuit breaker half-open failure, reopening");
                true
            }
            CircuitState::Open => false,
        };

        if reopen {
            inner.state = CircuitState::Open;
            inner.success_count = 0;
            inner.half_open_calls = 0;
            warn!(
                provider = %self.provider,
                failures = inner.failure_count,
                "Circuit breaker opened"
            );
        }
    }

    /// Reset to closed with all counters zeroed
    pub fn reset(&self) {
        self.inner.lock().close();
        info!(provider = %self.provider, "Circuit breaker reset");
    }

    /// Force the circuit open (for testing or manual intervention)
    pub fn force_open(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Open;
        inner.last_failure_time = Some(Instant::now());
        inner.success_count = 0;
        inner.half_open_calls = 0;
        warn!(provider = %self.provider, "Circuit breaker forced open");
    }

    /// Get current statistics
    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        CircuitBreakerStats {
            provider: self.provider.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            half_open_calls: inner.half_open_calls,
            last_failure_ms_ago: inner
                .last_failure_time
                .map(|at| at.elapsed().as_millis() as u64),
        }
    }
}

/// Admission to call a provider, taken from [`CircuitBreaker::acquire`].
///
/// Settle it with [`BreakerPermit::record_success`] or
/// [`BreakerPermit::record_failure`]. Dropping it unsettled, as on
/// cancellation or a client error, returns any half-open probe slot it holds.
#[derive(Debug)]
#[must_use = "dropping a permit leaves the call unrecorded"]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    probe_epoch: Option<u64>,
}

impl BreakerPermit {
    /// Whether this permit holds a half-open probe slot
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.probe_epoch.is_some()
    }

    /// Settle the call as a success
    pub fn record_success(mut self, config: &CircuitBreakerConfig) {
        self.probe_epoch = None;
        self.breaker.record_success(config);
    }

    /// Settle the call as a failure
    pub fn record_failure(mut self, config: &CircuitBreakerConfig) {
        self.probe_epoch = None;
        self.breaker.record_failure(config);
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if let Some(epoch) = self.probe_epoch.take() {
            self.breaker.release_probe(epoch);
        }
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerStats {
    /// Provider name
    pub provider: String,
    /// Current state
    pub state: CircuitState,
    /// Failures since the last close
    pub failure_count: u32,
    /// Successes in the current half-open period
    pub success_count: u32,
    /// Probes admitted in the current half-open period
    pub half_open_calls: u32,
    /// Milliseconds since the last failure
    pub last_failure_ms_ago: Option<u64>,
}

/// Per-provider breakers
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Breaker for `provider`, created closed on first reference
    pub fn get_or_create(&self, provider: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(provider) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .breakers
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(provider)));
        Arc::clone(entry.value())
    }

    /// Whether a call to `provider` may proceed
    pub fn can_attempt(&self, provider: &str, config: &CircuitBreakerConfig) -> bool {
        self.get_or_create(provider).can_attempt(config)
    }

    /// Permit for a call to `provider`, or `None` if its circuit rejects it
    pub fn acquire(&self, provider: &str, config: &CircuitBreakerConfig) -> Option<BreakerPermit> {
        self.get_or_create(provider).acquire(config)
    }

    /// Record a successful call to `provider`
    pub fn record_success(&self, provider: &str, config: &CircuitBreakerConfig) {
        self.get_or_create(provider).record_success(config);
    }

    /// Record a failed call to `provider`
    pub fn record_failure(&self, provider: &str, config: &CircuitBreakerConfig) {
        self.get_or_create(provider).record_failure(config);
    }

    /// Reset a provider's breaker; returns false if it was never created
    pub fn reset(&self, provider: &str) -> bool {
        match self.breakers.get(provider) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Current state; providers never referenced report `Closed`
    #[must_use]
    pub fn state(&self, provider: &str) -> CircuitState {
        self.breakers
            .get(provider)
            .map_or(CircuitState::Closed, |b| b.state())
    }

    /// Statistics for every breaker, sorted by provider
    #[must_use]
    pub fn stats(&self) -> Vec<CircuitBreakerStats> {
        let mut stats: Vec<_> = self.breakers.iter().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.provider.cmp(&b.provider));
        stats
    }

    /// Number of breakers created so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Whether no breaker has been created yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
