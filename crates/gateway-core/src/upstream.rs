//! Upstream provider contract.
//!
//! The gateway never speaks a provider wire protocol itself. Callers inject an
//! [`UpstreamInvoker`] and the executor drives it according to an
//! [`ExecutionPlan`].

use crate::request::InferenceRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Category of an upstream failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamErrorKind {
    /// The provider did not answer in time
    Timeout,
    /// The provider throttled the request
    RateLimited,
    /// The provider reported itself unavailable
    Unavailable,
    /// The provider failed internally
    ServerError,
    /// The connection could not be established or was dropped
    Connection,
    /// Anything else (bad request, auth failure, content rejection)
    Other,
}

impl UpstreamErrorKind {
    /// Canonical name used in retry and degradation rules
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limit",
            Self::Unavailable => "service_unavailable",
            Self::ServerError => "internal_server_error",
            Self::Connection => "connection_error",
            Self::Other => "upstream_error",
        }
    }

    /// Transient failures may succeed on a later attempt
    #[must_use]
    pub fn is_transient(self) -> bool {
        !matches!(self, Self::Other)
    }
}

impl fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by an upstream provider call
#[derive(Debug, Clone, Error)]
#[error("Provider '{provider}' failed ({kind}): {message}")]
pub struct UpstreamError {
    /// Provider that produced the error
    pub provider: String,
    /// Failure category
    pub kind: UpstreamErrorKind,
    /// Provider supplied message
    pub message: String,
}

impl UpstreamError {
    /// Create a new upstream error
    pub fn new(
        provider: impl Into<String>,
        kind: UpstreamErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Token accounting reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Completion tokens
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Create a usage record
    #[must_use]
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Successful upstream answer; this is also the cached value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamResponse {
    /// Provider that answered
    pub provider: String,
    /// Model that answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Generated content
    pub content: String,
    /// Token usage, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl UpstreamResponse {
    /// Create a response without usage information
    pub fn new(provider: impl Into<String>, model: Option<String>, content: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model,
            content: content.into(),
            usage: None,
        }
    }

    /// Attach usage information
    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// One provider/model pair the executor may try
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Provider name
    pub provider: String,
    /// Model, if known
    pub model: Option<String>,
    /// Provider-level timeout from the routing policy, used when the
    /// resilience policy has no more specific entry
    pub timeout_hint: Option<Duration>,
}

impl Candidate {
    /// Create a candidate
    pub fn new(provider: impl Into<String>, model: Option<String>) -> Self {
        Self {
            provider: provider.into(),
            model,
            timeout_hint: None,
        }
    }

    /// Set the timeout hint
    #[must_use]
    pub fn with_timeout_hint(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_hint = timeout;
        self
    }
}

/// Ordered candidates for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Endpoint the request arrived on
    pub endpoint: String,
    /// Primary first, then fallbacks
    pub candidates: Vec<Candidate>,
}

impl ExecutionPlan {
    /// Create a plan
    pub fn new(endpoint: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            endpoint: endpoint.into(),
            candidates,
        }
    }

    /// Primary provider, if any
    #[must_use]
    pub fn primary(&self) -> Option<&Candidate> {
        self.candidates.first()
    }
}

/// Target handed to the upstream operation for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    /// Provider to call
    pub provider: String,
    /// Model to request
    pub model: Option<String>,
    /// Endpoint of the inbound request
    pub endpoint: String,
    /// Attempt number against this provider, starting at 1
    pub attempt: u32,
}

/// Performs the actual network call into a provider
#[async_trait]
pub trait UpstreamInvoker: Send + Sync {
    /// Invoke the provider named by `target`
    async fn invoke(
        &self,
        target: &CallTarget,
        request: &InferenceRequest,
    ) -> Result<UpstreamResponse, UpstreamError>;
}
