//! Mock LLM providers for integration testing
//!
//! [`MockUpstream`] stands in for the network: each provider gets a scripted
//! behavior and every call is recorded.

use async_trait::async_trait;
use gateway_core::{
    CallTarget, InferenceRequest, TokenUsage, UpstreamError, UpstreamErrorKind, UpstreamInvoker,
    UpstreamResponse,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How a mocked provider answers
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Always answer
    Succeed,
    /// Always fail with the given kind
    Fail(UpstreamErrorKind),
    /// Fail the first `n` calls, then answer
    FailTimes(usize, UpstreamErrorKind),
    /// Answer after a delay
    Delay(Duration),
}

/// One recorded upstream call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Provider called
    pub provider: String,
    /// Model requested
    pub model: Option<String>,
    /// Attempt number against the provider
    pub attempt: u32,
    /// Query text
    pub query: String,
}

/// Scripted upstream
#[derive(Debug)]
pub struct MockUpstream {
    behaviors: Mutex<HashMap<String, Behavior>>,
    served: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<RecordedCall>>,
    call_count: AtomicUsize,
    usage: Option<TokenUsage>,
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUpstream {
    /// Every provider answers
    pub fn new() -> Self {
        Self {
            behaviors: Mutex::new(HashMap::new()),
            served: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            usage: Some(TokenUsage::new(50, 100)),
        }
    }

    /// Script a provider
    pub fn with(self, provider: &str, behavior: Behavior) -> Self {
        self.set(provider, behavior);
        self
    }

    /// Report no token usage in responses
    pub fn without_usage(mut self) -> Self {
        self.usage = None;
        self
    }

    /// Report the given usage in responses
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Change a provider's behavior mid-test
    pub fn set(&self, provider: &str, behavior: Behavior) {
        self.behaviors.lock().insert(provider.to_string(), behavior);
        self.served.lock().remove(provider);
    }

    /// Total number of calls
    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Calls made to one provider
    pub fn calls_to(&self, provider: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.provider == provider)
            .count()
    }

    /// Providers called, in order
    pub fn providers_called(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.provider.clone()).collect()
    }

    /// Every recorded call
    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    fn respond(&self, target: &CallTarget) -> Result<Option<Duration>, UpstreamError> {
        let behavior = self
            .behaviors
            .lock()
            .get(&target.provider)
            .cloned()
            .unwrap_or(Behavior::Succeed);

        let fail = |kind: UpstreamErrorKind| -> Result<Option<Duration>, UpstreamError> {
            Err(UpstreamError::new(&target.provider, kind, "mock failure"))
        };
        match behavior {
            Behavior::Succeed => Ok(None),
            Behavior::Delay(delay) => Ok(Some(delay)),
            Behavior::Fail(kind) => fail(kind),
            Behavior::FailTimes(n, kind) => {
                let mut served = self.served.lock();
                let count = served.entry(target.provider.clone()).or_insert(0);
                *count += 1;
                if *count <= n {
                    fail(kind)
                } else {
                    Ok(None)
                }
            }
        }
    }
}

#[async_trait]
impl UpstreamInvoker for MockUpstream {
    async fn invoke(
        &self,
        target: &CallTarget,
        request: &InferenceRequest,
    ) -> Result<UpstreamResponse, UpstreamError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(RecordedCall {
            provider: target.provider.clone(),
            model: target.model.clone(),
            attempt: target.attempt,
            query: request.query.clone(),
        });

        if let Some(delay) = self.respond(target)? {
            tokio::time::sleep(delay).await;
        }

        let mut response = UpstreamResponse::new(
            &target.provider,
            target.model.clone(),
            mock_content(&target.provider, &request.query),
        );
        response.usage = self.usage;
        Ok(response)
    }
}

/// Content the mock returns for a query
pub fn mock_content(provider: &str, query: &str) -> String {
    format!("{provider} says: {query}")
}
