//! Resilience policy document: retry, circuit breaker, timeout and
//! degradation settings.

use crate::error::{ConfigError, ConfigResult};
use crate::serde_helpers::{default_name, default_true, default_version, duration_map, scalar_string};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Key used for the fallback entry in per-provider maps
pub const DEFAULT_KEY: &str = "default";

/// Backoff curve between retry attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// `initial * multiplier^(attempt-1)`
    #[default]
    Exponential,
    /// `initial * attempt`
    Linear,
    /// Always `initial`
    Fixed,
}

/// Retry strategy for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryStrategy {
    /// Total attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff curve
    #[serde(default)]
    pub backoff_type: BackoffType,

    /// Delay before the second attempt
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound on any single delay
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    /// Exponential growth factor
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Random spread applied to each delay (0.0 - 1.0)
    #[serde(default)]
    pub jitter: f64,

    /// Error categories that are retried in addition to the built-in
    /// transient vocabulary
    #[serde(default = "default_retryable_errors")]
    pub retryable_errors: Vec<String>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_retryable_errors() -> Vec<String> {
    ["rate_limit", "timeout", "service_unavailable", "internal_server_error"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_type: BackoffType::Exponential,
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
            jitter: 0.0,
            retryable_errors: default_retryable_errors(),
        }
    }
}

impl RetryStrategy {
    fn validate(&self, key: &str) -> ConfigResult<()> {
        let field = |name: &str| format!("retry_strategies.{key}.{name}");
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("resilience", field("max_attempts"), "must be at least 1"));
        }
        if self.initial_delay > self.max_delay {
            return Err(ConfigError::invalid(
                "resilience",
                field("initial_delay"),
                "must not exceed max_delay",
            ));
        }
        if self.backoff_type == BackoffType::Exponential && self.multiplier < 1.0 {
            return Err(ConfigError::invalid("resilience", field("multiplier"), "must be at least 1.0"));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::invalid("resilience", field("jitter"), "must be between 0.0 and 1.0"));
        }
        Ok(())
    }
}

/// Circuit breaker thresholds for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Half-open successes before closing
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Time the circuit stays open before probing
    #[serde(default = "default_open_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Probes permitted while half-open
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_open_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_half_open_max_calls() -> u32 {
    3
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout: default_open_timeout(),
            half_open_max_calls: default_half_open_max_calls(),
        }
    }
}

impl CircuitBreakerConfig {
    fn validate(&self, key: &str) -> ConfigResult<()> {
        let field = |name: &str| format!("circuit_breakers.{key}.{name}");
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("resilience", field("failure_threshold"), "must be at least 1"));
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::invalid("resilience", field("success_threshold"), "must be at least 1"));
        }
        if self.half_open_max_calls < self.success_threshold {
            return Err(ConfigError::invalid(
                "resilience",
                field("half_open_max_calls"),
                "must be at least success_threshold",
            ));
        }
        Ok(())
    }
}

/// Layered call timeouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout when nothing more specific applies
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub default: Duration,

    /// Per provider
    #[serde(default, with = "duration_map")]
    pub per_provider: HashMap<String, Duration>,

    /// Per model
    #[serde(default, with = "duration_map")]
    pub per_model: HashMap<String, Duration>,

    /// Per endpoint
    #[serde(default, with = "duration_map")]
    pub per_endpoint: HashMap<String, Duration>,
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default: default_timeout(),
            per_provider: HashMap::new(),
            per_model: HashMap::new(),
            per_endpoint: HashMap::new(),
        }
    }
}

/// What a degradation rule reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationCondition {
    /// Error category or message contains `threshold`
    ErrorType,
    /// Elapsed time exceeded `max_latency`
    LatencyThreshold,
    /// The named provider (or any provider) failed
    ProviderFailure,
}

/// What a degradation rule does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationAction {
    /// Retry with a cheaper or smaller model
    DowngradeModel,
    /// Switch to the fallback provider
    UseFallback,
    /// Serve a cached answer if one exists
    ReturnCached,
}

/// A graceful degradation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationRule {
    /// Trigger
    pub condition: DegradationCondition,

    /// Condition argument (error substring or provider name)
    #[serde(
        default,
        deserialize_with = "scalar_string::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub threshold: Option<String>,

    /// Reaction
    pub action: DegradationAction,

    /// Provider to switch to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_provider: Option<String>,

    /// Model to use with the fallback provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<String>,

    /// Latency bound for `latency_threshold`
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub max_latency: Option<Duration>,
}

/// Resilience policy snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResiliencePolicy {
    /// Policy version
    #[serde(default = "default_version")]
    pub version: String,

    /// Policy name
    #[serde(default = "default_name")]
    pub name: String,

    /// Retry strategy per provider, with a `default` entry
    #[serde(default = "default_retry_strategies")]
    pub retry_strategies: HashMap<String, RetryStrategy>,

    /// Breaker thresholds per provider, with a `default` entry
    #[serde(default = "default_circuit_breakers")]
    pub circuit_breakers: HashMap<String, CircuitBreakerConfig>,

    /// Call timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Degradation rules, first match wins
    #[serde(default, alias = "graceful_degradation")]
    pub degradation_rules: Vec<DegradationRule>,

    /// Use circuit breakers
    #[serde(default = "default_true")]
    pub enable_circuit_breaker: bool,

    /// Retry transient failures
    #[serde(default = "default_true")]
    pub enable_retry: bool,

    /// Apply degradation rules
    #[serde(default = "default_true")]
    pub enable_graceful_degradation: bool,
}

fn default_retry_strategies() -> HashMap<String, RetryStrategy> {
    HashMap::from([(DEFAULT_KEY.to_string(), RetryStrategy::default())])
}

fn default_circuit_breakers() -> HashMap<String, CircuitBreakerConfig> {
    HashMap::from([(DEFAULT_KEY.to_string(), CircuitBreakerConfig::default())])
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: default_name(),
            retry_strategies: default_retry_strategies(),
            circuit_breakers: default_circuit_breakers(),
            timeouts: TimeoutConfig::default(),
            degradation_rules: Vec::new(),
            enable_circuit_breaker: true,
            enable_retry: true,
            enable_graceful_degradation: true,
        }
    }
}

impl ResiliencePolicy {
    /// Retry strategy for a provider, falling back to `default` then built-ins
    #[must_use]
    pub fn retry_strategy_for(&self, provider: &str) -> RetryStrategy {
        self.retry_strategies
            .get(provider)
            .or_else(|| self.retry_strategies.get(DEFAULT_KEY))
            .cloned()
            .unwrap_or_default()
    }

    /// Breaker thresholds for a provider, falling back to `default` then built-ins
    #[must_use]
    pub fn circuit_breaker_for(&self, provider: &str) -> CircuitBreakerConfig {
        self.circuit_breakers
            .get(provider)
            .or_else(|| self.circuit_breakers.get(DEFAULT_KEY))
            .copied()
            .unwrap_or_default()
    }

    /// Validate the policy
    ///
    /// # Errors
    /// Returns the first out-of-range retry, breaker or timeout value
    pub fn validate(&self) -> ConfigResult<()> {
        for (key, strategy) in &self.retry_strategies {
            strategy.validate(key)?;
        }
        for (key, breaker) in &self.circuit_breakers {
            breaker.validate(key)?;
        }
        if self.timeouts.default.is_zero() {
            return Err(ConfigError::invalid(
                "resilience",
                "timeouts.default",
                "must be greater than zero",
            ));
        }
        for (index, rule) in self.degradation_rules.iter().enumerate() {
            if rule.condition == DegradationCondition::LatencyThreshold && rule.max_latency.is_none() {
                return Err(ConfigError::invalid(
                    "resilience",
                    format!("degradation_rules[{index}].max_latency"),
                    "is required for latency_threshold rules",
                ));
            }
        }
        Ok(())
    }
}
