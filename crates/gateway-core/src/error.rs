//! Error types for the policy gateway.
//!
//! Every fallible operation in the gateway returns [`GatewayResult`]. The
//! variants map onto the failure taxonomy the orchestration layer reacts to:
//! client errors surface immediately, transient upstream errors are retried,
//! and budget or circuit rejections short-circuit before any upstream call.

use crate::upstream::{UpstreamError, UpstreamErrorKind};
use std::time::Duration;
use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors produced by the gateway core
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The inbound request is malformed
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Error message
        message: String,
        /// Offending field, if known
        field: Option<String>,
    },

    /// A request explicitly named a provider that is disabled or unknown
    #[error("Provider '{provider}' is not enabled")]
    ProviderDisabled {
        /// Provider name
        provider: String,
    },

    /// A policy references something that does not exist or is out of range
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// Upstream provider returned an error
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The whole retry sequence for a provider exceeded its deadline
    #[error("Provider '{provider}' timed out after {timeout:?}")]
    Timeout {
        /// Provider name
        provider: String,
        /// Effective timeout that elapsed
        timeout: Duration,
    },

    /// Every candidate was skipped because its circuit is open
    #[error("Circuit breaker open for provider '{provider}'")]
    CircuitOpen {
        /// Primary provider of the plan
        provider: String,
    },

    /// The budget tracker rejected the estimated spend
    #[error("Budget exceeded: {reason}")]
    BudgetExceeded {
        /// Human readable rejection reason
        reason: String,
    },

    /// The request exceeds configured token limits
    #[error("Token limit exceeded: {reason}")]
    TokenLimitExceeded {
        /// Human readable violation
        reason: String,
    },

    /// Primary and all fallbacks failed
    #[error("All {attempted} candidate provider(s) failed; last error: {last}")]
    AllCandidatesExhausted {
        /// Number of candidates actually attempted
        attempted: usize,
        /// Error from the last attempted candidate
        last: Box<GatewayError>,
    },

    /// The request was cancelled by the caller
    #[error("Request cancelled")]
    Cancelled,

    /// Cache layer failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            field: field.map(String::from),
        }
    }

    /// Create a provider disabled error
    pub fn provider_disabled(provider: impl Into<String>) -> Self {
        Self::ProviderDisabled {
            provider: provider.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(provider: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            provider: provider.into(),
            timeout,
        }
    }

    /// Create a circuit open error
    pub fn circuit_open(provider: impl Into<String>) -> Self {
        Self::CircuitOpen {
            provider: provider.into(),
        }
    }

    /// Create a budget exceeded error
    pub fn budget_exceeded(reason: impl ToString) -> Self {
        Self::BudgetExceeded {
            reason: reason.to_string(),
        }
    }

    /// Create a token limit error
    pub fn token_limit(reason: impl ToString) -> Self {
        Self::TokenLimitExceeded {
            reason: reason.to_string(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short machine-readable category used for retry and degradation matching
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::ProviderDisabled { .. } => "provider_disabled",
            Self::InvalidPolicy(_) => "invalid_policy",
            Self::Upstream(err) => err.kind.as_str(),
            Self::Timeout { .. } => "timeout",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::TokenLimitExceeded { .. } => "token_limit_exceeded",
            Self::AllCandidatesExhausted { .. } => "all_candidates_exhausted",
            Self::Cancelled => "cancelled",
            Self::Cache(_) => "cache_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether the error is a transient upstream condition worth retrying
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream(err) => err.kind.is_transient(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Whether the error is the caller's fault and must not be retried
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::ProviderDisabled { .. }
                | Self::InvalidPolicy(_)
                | Self::BudgetExceeded { .. }
                | Self::TokenLimitExceeded { .. }
        )
    }

    /// Upstream error kind, if this error came from a provider
    #[must_use]
    pub fn upstream_kind(&self) -> Option<UpstreamErrorKind> {
        match self {
            Self::Upstream(err) => Some(err.kind),
            Self::Timeout { .. } => Some(UpstreamErrorKind::Timeout),
            _ => None,
        }
    }
}
