//! # Gateway Resilience
//!
//! Resilience patterns for the LLM Policy Gateway:
//! - Per-provider circuit breakers
//! - Retry with exponential, linear or fixed backoff
//! - Endpoint, model and provider timeout resolution
//! - Graceful degradation rules
//! - An executor that runs a fallback plan through all of the above

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit_breaker;
pub mod degradation;
pub mod executor;
pub mod retry;
pub mod timeout;

// Re-export main types
pub use circuit_breaker::{
    BreakerPermit, CircuitBreaker, CircuitBreakerRegistry, CircuitBreakerStats, CircuitState,
};
pub use degradation::DegradationDecision;
pub use executor::{AttemptStatus, CandidateAttempt, ExecutionOutcome, ResilienceExecutor};
pub use retry::{backoff_delay, is_retryable, RetryExecutor, RetryOutcome};
pub use timeout::resolve_timeout;
