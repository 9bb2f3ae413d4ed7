//! Simulate command - drive the gateway against a mock upstream.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clap::Args;
use gateway_cache::HashingEmbedder;
use gateway_config::PolicySet;
use gateway_core::{
    CallTarget, InferenceRequest, TokenUsage, UpstreamError, UpstreamErrorKind, UpstreamInvoker,
    UpstreamResponse,
};
use gateway_engine::PolicyGateway;
use gateway_telemetry::GatewayMetrics;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const SAMPLE_QUERIES: &[&str] = &[
    "What is the capital of France?",
    "Summarize the plot of Hamlet in two sentences.",
    "Explain step by step how a B-tree stays balanced and compare it with an LSM tree.",
    "What is the capital of France?",
    "Translate 'good morning' into Spanish.",
    "Analyze the trade-offs between optimistic and pessimistic locking in detail.",
];

/// Arguments for the simulate command.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of requests to send
    #[arg(short = 'n', long, default_value_t = 12)]
    pub requests: usize,

    /// Failure rate for a provider, as provider=rate (repeatable)
    #[arg(long = "fail", value_parser = parse_failure_rate)]
    pub failures: Vec<(String, f64)>,

    /// Simulated upstream latency in milliseconds
    #[arg(long, default_value_t = 10)]
    pub latency_ms: u64,

    /// Query to send instead of the built-in samples (repeatable)
    #[arg(short, long = "query")]
    pub queries: Vec<String>,

    /// Agent name for every request
    #[arg(long, default_value = gateway_core::DEFAULT_AGENT)]
    pub agent: String,

    /// Enable semantic cache lookups with the built-in hashing embedder
    #[arg(long)]
    pub semantic: bool,

    /// Print the Prometheus exposition after the run
    #[arg(long)]
    pub metrics: bool,
}

fn parse_failure_rate(value: &str) -> Result<(String, f64), String> {
    let (provider, rate) = value
        .split_once('=')
        .ok_or_else(|| format!("expected provider=rate, got '{value}'"))?;
    let rate: f64 = rate
        .parse()
        .map_err(|_| format!("invalid failure rate '{rate}'"))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(format!("failure rate must be between 0 and 1, got {rate}"));
    }
    Ok((provider.trim().to_lowercase(), rate))
}

/// Upstream that answers after a fixed delay and fails at random
#[derive(Debug)]
pub struct SimulatedUpstream {
    failure_rates: HashMap<String, f64>,
    latency: Duration,
}

impl SimulatedUpstream {
    /// Create a simulated upstream
    pub fn new(failure_rates: HashMap<String, f64>, latency: Duration) -> Self {
        Self {
            failure_rates,
            latency,
        }
    }
}

#[async_trait]
impl UpstreamInvoker for SimulatedUpstream {
    async fn invoke(
        &self,
        target: &CallTarget,
        request: &InferenceRequest,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let roll: f64 = rand::thread_rng().gen();
        tokio::time::sleep(self.latency).await;

        let rate = self.failure_rates.get(&target.provider).copied().unwrap_or(0.0);
        if roll < rate {
            debug!(provider = %target.provider, attempt = target.attempt, "Simulated failure");
            return Err(UpstreamError::new(
                &target.provider,
                UpstreamErrorKind::Unavailable,
                "simulated outage",
            ));
        }

        let input = gateway_cost::estimate_tokens(&request.query);
        Ok(UpstreamResponse::new(
            &target.provider,
            target.model.clone(),
            format!("[{}] simulated answer to: {}", target.provider, request.query),
        )
        .with_usage(TokenUsage::new(input, 64)))
    }
}

/// Execute the simulate command.
pub async fn execute(mut policies: PolicySet, args: SimulateArgs) -> Result<()> {
    if args.semantic {
        policies.caching.semantic_similarity.enabled = true;
    }

    let metrics = GatewayMetrics::new()?;
    let mut builder = PolicyGateway::builder().policies(policies).metrics(metrics);
    if args.semantic {
        builder = builder.embedder(Arc::new(HashingEmbedder::default()));
    }
    let gateway = builder.build()?;

    let upstream = SimulatedUpstream::new(
        args.failures.into_iter().collect(),
        Duration::from_millis(args.latency_ms),
    );
    let queries: Vec<String> = if args.queries.is_empty() {
        SAMPLE_QUERIES.iter().map(|q| (*q).to_string()).collect()
    } else {
        args.queries
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    for (index, query) in queries.iter().cycle().take(args.requests).enumerate() {
        if cancel.is_cancelled() {
            warn!(completed = index, "Simulation interrupted");
            break;
        }
        let request = InferenceRequest::builder()
            .query(query.as_str())
            .agent(args.agent.as_str())
            .build()?;

        let line = match gateway.handle(&request, &upstream, &cancel).await {
            Ok(outcome) => serde_json::json!({
                "request": index + 1,
                "ok": true,
                "provider": outcome.provider,
                "model": outcome.model,
                "served_from_cache": outcome.served_from_cache,
                "cache_source": outcome.cache_source,
                "cost_rerouted": outcome.cost_rerouted,
                "fallback_used": outcome.fallback_used,
                "attempts": outcome.attempts,
                "estimated_cost": outcome.estimated_cost,
                "actual_cost": outcome.actual_cost,
                "elapsed_ms": outcome.elapsed_ms,
            }),
            Err(err) => serde_json::json!({
                "request": index + 1,
                "ok": false,
                "error": err.category(),
                "message": err.to_string(),
            }),
        };
        println!("{line}");
    }

    println!("{}", serde_json::to_string_pretty(&gateway.status())?);
    if args.metrics {
        let metrics = gateway
            .metrics()
            .ok_or_else(|| anyhow!("metrics not attached"))?;
        print!("{}", metrics.render()?);
    }
    Ok(())
}
