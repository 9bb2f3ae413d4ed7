//! Retry with configurable backoff.
//!
//! Provides backoff curves, the retryable-error test and an async retry loop
//! driven by a [`RetryStrategy`] from the resilience policy.

use gateway_config::{BackoffType, RetryStrategy};
use gateway_core::GatewayError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Vocabulary of transient failures that is always retried
const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "connection",
    "rate_limit",
    "rate limit",
    "unavailable",
    "server_error",
    "temporar",
];

/// Delay before the attempt following `attempt` (1-based), without jitter
#[must_use]
pub fn backoff_delay(strategy: &RetryStrategy, attempt: u32) -> Duration {
    let attempt = attempt.max(1);
    let initial = strategy.initial_delay.as_secs_f64();
    let raw = match strategy.backoff_type {
        BackoffType::Exponential => {
            let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
            initial * strategy.multiplier.powi(exponent)
        }
        BackoffType::Linear => initial * f64::from(attempt),
        BackoffType::Fixed => initial,
    };
    let capped = raw.min(strategy.max_delay.as_secs_f64());
    if capped.is_finite() && capped > 0.0 {
        Duration::from_secs_f64(capped)
    } else if capped > 0.0 {
        strategy.max_delay
    } else {
        Duration::ZERO
    }
}

/// Backoff delay with the strategy's jitter applied
#[must_use]
pub fn jittered_delay(strategy: &RetryStrategy, attempt: u32) -> Duration {
    let delay = backoff_delay(strategy, attempt);
    if strategy.jitter <= 0.0 || delay.is_zero() {
        return delay;
    }
    let base = delay.as_secs_f64();
    let range = base * strategy.jitter.min(1.0);
    let offset = rand::thread_rng().gen_range(-range..=range);
    Duration::from_secs_f64((base + offset).max(0.0))
}

/// Check if an error should be retried under `strategy`.
///
/// Client errors never are. Otherwise the error's category or message must
/// match a configured entry or the built-in transient vocabulary.
#[must_use]
pub fn is_retryable(error: &GatewayError, strategy: &RetryStrategy) -> bool {
    if error.is_client_error() || matches!(error, GatewayError::Cancelled) {
        return false;
    }

    let category = error.category();
    let message = error.to_string().to_lowercase();

    let configured = strategy.retryable_errors.iter().any(|entry| {
        let entry = entry.to_lowercase();
        category == entry || message.contains(&entry)
    });

    configured
        || TRANSIENT_MARKERS
            .iter()
            .any(|marker| category.contains(marker) || message.contains(marker))
}

/// Result of a retry sequence
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Final result
    pub result: Result<T, GatewayError>,
    /// Attempts made
    pub attempts: u32,
}

/// Runs an operation under a retry strategy
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    strategy: RetryStrategy,
}

impl RetryExecutor {
    /// Create an executor for a strategy
    #[must_use]
    pub fn new(strategy: RetryStrategy) -> Self {
        Self { strategy }
    }

    /// Executor that makes exactly one attempt
    #[must_use]
    pub fn single_attempt() -> Self {
        Self::new(RetryStrategy {
            max_attempts: 1,
            ..Default::default()
        })
    }

    /// Strategy in use
    #[must_use]
    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    /// Execute `operation` up to `max_attempts` times.
    ///
    /// The operation receives the 1-based attempt number. Non-retryable errors
    /// end the sequence immediately. Sleeps between attempts are cooperative,
    /// so dropping the returned future abandons the remaining attempts.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let max_attempts = self.strategy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Retry succeeded");
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(error) => {
                    if attempt >= max_attempts || !is_retryable(&error, &self.strategy) {
                        return RetryOutcome {
                            result: Err(error),
                            attempts: attempt,
                        };
                    }

                    let delay = jittered_delay(&self.strategy, attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying after error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
