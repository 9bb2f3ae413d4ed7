//! Resilience executor.
//!
//! Drives an [`ExecutionPlan`] through circuit breakers, retries, timeouts and
//! degradation rules until one candidate succeeds or all are exhausted. The
//! executor holds no per-request state and may be shared freely.

use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::degradation::{self, DegradationDecision};
use crate::retry::RetryExecutor;
use crate::timeout::resolve_timeout;
use gateway_config::{ResiliencePolicy, SharedPolicy};
use gateway_core::{CallTarget, Candidate, ExecutionPlan, GatewayError, GatewayResult};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How one candidate fared
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The candidate answered
    Succeeded,
    /// The candidate failed with the given error category
    Failed {
        /// Error category
        category: &'static str,
    },
}

/// Record of one attempted candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateAttempt {
    /// Provider
    pub provider: String,
    /// Model
    pub model: Option<String>,
    /// Calls made, including retries
    pub calls: u32,
    /// Result
    pub status: AttemptStatus,
    /// Time spent on this candidate
    pub elapsed_ms: u64,
}

/// Successful execution
#[derive(Debug, Clone)]
pub struct ExecutionOutcome<T> {
    /// Value returned by the successful call
    pub value: T,
    /// Provider that answered
    pub provider: String,
    /// Model that answered
    pub model: Option<String>,
    /// Every attempted candidate, in order
    pub attempts: Vec<CandidateAttempt>,
    /// Candidates skipped because their circuit was open
    pub skipped: Vec<String>,
    /// Total time spent
    pub elapsed: Duration,
}

impl<T> ExecutionOutcome<T> {
    /// Whether a provider other than the first attempted one answered
    #[must_use]
    pub fn fallback_used(&self) -> bool {
        self.attempts.len() > 1 || !self.skipped.is_empty()
    }

    /// Calls made across all candidates
    #[must_use]
    pub fn total_calls(&self) -> u32 {
        self.attempts.iter().map(|a| a.calls).sum()
    }
}

/// Executes plans against an injected upstream operation
#[derive(Debug, Clone)]
pub struct ResilienceExecutor {
    policy: SharedPolicy<ResiliencePolicy>,
    breakers: Arc<CircuitBreakerRegistry>,
}

impl ResilienceExecutor {
    /// Create an executor
    #[must_use]
    pub fn new(policy: SharedPolicy<ResiliencePolicy>, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        Self { policy, breakers }
    }

    /// Breaker registry shared with this executor
    #[must_use]
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// Run `plan`, calling `call` for every attempt.
    ///
    /// Candidates are tried in order; open circuits are skipped without
    /// counting as failures. Each attempted candidate's whole retry sequence
    /// runs under one deadline and records at most one breaker failure.
    ///
    /// # Errors
    /// - `Cancelled` if `cancel` fires
    /// - a client error returned by `call`, unchanged
    /// - `CircuitOpen` if every candidate was skipped
    /// - `AllCandidatesExhausted` carrying the last failure otherwise
    pub async fn execute<T, F, Fut>(
        &self,
        plan: &ExecutionPlan,
        cancel: &CancellationToken,
        call: F,
    ) -> GatewayResult<ExecutionOutcome<T>>
    where
        F: Fn(CallTarget) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let policy = self.policy.load_full();
        let started = Instant::now();

        let mut queue = dedupe(&plan.candidates);
        let primary = queue
            .front()
            .map(|c| c.provider.clone())
            .ok_or_else(|| GatewayError::internal("execution plan has no candidates"))?;

        let mut attempts: Vec<CandidateAttempt> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();
        let mut last_error: Option<GatewayError> = None;

        while let Some(candidate) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }

            let provider = candidate.provider.clone();
            let breaker_config = policy.circuit_breaker_for(&provider);
            // Held across the call; dropped unsettled on cancellation or a
            // client error so a half-open probe slot is not lost
            let permit = if policy.enable_circuit_breaker {
                match self.breakers.acquire(&provider, &breaker_config) {
                    Some(permit) => Some(permit),
                    None => {
                        warn!(provider = %provider, "Circuit open, skipping provider");
                        skipped.push(provider);
                        continue;
                    }
                }
            } else {
                None
            };

            let timeout = resolve_timeout(
                &policy.timeouts,
                &plan.endpoint,
                candidate.model.as_deref(),
                &provider,
                candidate.timeout_hint,
            );
            let retry = if policy.enable_retry {
                RetryExecutor::new(policy.retry_strategy_for(&provider))
            } else {
                RetryExecutor::single_attempt()
            };

            let calls = AtomicU32::new(0);
            let candidate_started = Instant::now();
            let sequence = retry.run(|attempt| {
                calls.store(attempt, Ordering::Relaxed);
                call(CallTarget {
                    provider: provider.clone(),
                    model: candidate.model.clone(),
                    endpoint: plan.endpoint.clone(),
                    attempt,
                })
            });

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(provider = %provider, "Request cancelled during upstream call");
                    return Err(GatewayError::Cancelled);
                }
                timed = tokio::time::timeout(timeout, sequence) => match timed {
                    Ok(outcome) => outcome.result,
                    Err(_) => Err(GatewayError::timeout(provider.clone(), timeout)),
                },
            };
            let elapsed = candidate_started.elapsed();
            let calls = calls.load(Ordering::Relaxed);

            match result {
                Ok(value) => {
                    if let Some(permit) = permit {
                        permit.record_success(&breaker_config);
                    }
                    attempts.push(CandidateAttempt {
                        provider: provider.clone(),
                        model: candidate.model.clone(),
                        calls,
                        status: AttemptStatus::Succeeded,
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                    if attempts.len() > 1 || !skipped.is_empty() {
                        info!(provider = %provider, primary = %primary, "Fallback provider succeeded");
                    }
                    return Ok(ExecutionOutcome {
                        value,
                        provider,
                        model: candidate.model,
                        attempts,
                        skipped,
                        elapsed: started.elapsed(),
                    });
                }
                Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
                Err(err) if err.is_client_error() => {
                    debug!(provider = %provider, error = %err, "Client error, not failing over");
                    return Err(err);
                }
                Err(err) => {
                    if let Some(permit) = permit {
                        permit.record_failure(&breaker_config);
                    }
                    warn!(
                        provider = %provider,
                        calls,
                        error = %err,
                        remaining = queue.len(),
                        "Provider failed"
                    );
                    attempts.push(CandidateAttempt {
                        provider: provider.clone(),
                        model: candidate.model.clone(),
                        calls,
                        status: AttemptStatus::Failed {
                            category: err.category(),
                        },
                        elapsed_ms: elapsed.as_millis() as u64,
                    });

                    if policy.enable_graceful_degradation {
                        if let Some(decision) =
                            degradation::evaluate(&policy.degradation_rules, &err, elapsed, &provider)
                        {
                            apply_degradation(&mut queue, decision);
                        }
                    }
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(last) => {
                error!(
                    primary = %primary,
                    attempted = attempts.len(),
                    skipped = skipped.len(),
                    error = %last,
                    "All candidate providers failed"
                );
                Err(GatewayError::AllCandidatesExhausted {
                    attempted: attempts.len(),
                    last: Box::new(last),
                })
            }
            None => {
                warn!(primary = %primary, "Every candidate circuit is open");
                Err(GatewayError::circuit_open(primary))
            }
        }
    }
}

fn dedupe(candidates: &[Candidate]) -> VecDeque<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter(|c| seen.insert(c.provider.clone()))
        .cloned()
        .collect()
}

/// Move the named fallback provider to the front of the remaining queue
fn apply_degradation(queue: &mut VecDeque<Candidate>, decision: DegradationDecision) {
    let Some(target) = decision.fallback_provider else {
        debug!(action = ?decision.action, "Degradation rule names no provider, continuing in order");
        return;
    };

    match queue.iter().position(|c| c.provider == target) {
        Some(position) => {
            if let Some(mut candidate) = queue.remove(position) {
                if decision.fallback_model.is_some() {
                    candidate.model = decision.fallback_model;
                }
                queue.push_front(candidate);
            }
        }
        None => debug!(provider = %target, "Degradation fallback is not a remaining candidate"),
    }
}
