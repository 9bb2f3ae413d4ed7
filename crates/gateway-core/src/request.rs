//! Inbound request type.
//!
//! An [`InferenceRequest`] carries everything the policy engine needs to route,
//! cache and budget a call. Prompt construction and transport concerns live
//! outside the gateway.

use crate::error::GatewayError;
use crate::types::{CostMode, RequestId};
use serde::{Deserialize, Serialize};

/// Endpoint used when the caller does not name one
pub const DEFAULT_ENDPOINT: &str = "/v1/chat";

/// Agent used when the caller does not name one
pub const DEFAULT_AGENT: &str = "default";

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_agent() -> String {
    DEFAULT_AGENT.to_string()
}

fn default_true() -> bool {
    true
}

/// A request entering the policy engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Unique request identifier
    #[serde(default = "RequestId::generate")]
    pub id: RequestId,

    /// The query text
    pub query: String,

    /// Logical agent issuing the query
    #[serde(default = "default_agent")]
    pub agent: String,

    /// Endpoint the request arrived on
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Explicitly requested provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_provider: Option<String>,

    /// Explicitly requested model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_model: Option<String>,

    /// Cost versus quality preference; the routing policy's mode applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_mode: Option<CostMode>,

    /// Whether fallback providers may be used
    #[serde(default = "default_true")]
    pub enable_fallback: bool,
}

impl InferenceRequest {
    /// Create a request for a query with all other fields defaulted
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: RequestId::generate(),
            query: query.into(),
            agent: default_agent(),
            endpoint: default_endpoint(),
            requested_provider: None,
            requested_model: None,
            cost_mode: None,
            enable_fallback: true,
        }
    }

    /// Create a new builder for `InferenceRequest`
    #[must_use]
    pub fn builder() -> InferenceRequestBuilder {
        InferenceRequestBuilder::default()
    }

    /// Validate the request
    ///
    /// # Errors
    /// Returns error if the query, agent or endpoint is empty
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.query.trim().is_empty() {
            return Err(GatewayError::invalid_request(
                "query cannot be empty",
                Some("query"),
            ));
        }

        if self.agent.trim().is_empty() {
            return Err(GatewayError::invalid_request(
                "agent cannot be empty",
                Some("agent"),
            ));
        }

        if !self.endpoint.starts_with('/') {
            return Err(GatewayError::invalid_request(
                format!("endpoint must start with '/', got '{}'", self.endpoint),
                Some("endpoint"),
            ));
        }

        if let Some(provider) = &self.requested_provider {
            if provider.trim().is_empty() {
                return Err(GatewayError::invalid_request(
                    "requested_provider cannot be blank",
                    Some("requested_provider"),
                ));
            }
        }

        Ok(())
    }
}

/// Builder for `InferenceRequest`
#[derive(Debug, Default)]
pub struct InferenceRequestBuilder {
    id: Option<RequestId>,
    query: Option<String>,
    agent: Option<String>,
    endpoint: Option<String>,
    requested_provider: Option<String>,
    requested_model: Option<String>,
    cost_mode: Option<CostMode>,
    enable_fallback: Option<bool>,
}

impl InferenceRequestBuilder {
    /// Set the request ID
    #[must_use]
    pub fn id(mut self, id: RequestId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the query
    #[must_use]
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the agent
    #[must_use]
    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Set the endpoint
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Request a specific provider
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.requested_provider = Some(provider.into());
        self
    }

    /// Request a specific model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.requested_model = Some(model.into());
        self
    }

    /// Set the cost mode
    #[must_use]
    pub fn cost_mode(mut self, mode: CostMode) -> Self {
        self.cost_mode = Some(mode);
        self
    }

    /// Enable or disable fallback providers
    #[must_use]
    pub fn enable_fallback(mut self, enabled: bool) -> Self {
        self.enable_fallback = Some(enabled);
        self
    }

    /// Build and validate the request
    ///
    /// # Errors
    /// Returns error if the query is missing or the request fails validation
    pub fn build(self) -> Result<InferenceRequest, GatewayError> {
        let query = self
            .query
            .ok_or_else(|| GatewayError::invalid_request("query is required", Some("query")))?;

        let request = InferenceRequest {
            id: self.id.unwrap_or_else(RequestId::generate),
            query,
            agent: self.agent.unwrap_or_else(default_agent),
            endpoint: self.endpoint.unwrap_or_else(default_endpoint),
            requested_provider: self.requested_provider,
            requested_model: self.requested_model,
            cost_mode: self.cost_mode,
            enable_fallback: self.enable_fallback.unwrap_or(true),
        };
        request.validate()?;
        Ok(request)
    }
}
