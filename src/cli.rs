//! CLI argument definitions using clap.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gateway_config::{PolicyLoader, PolicySet, POLICIES_PATH_ENV};
use gateway_core::CostMode;
use gateway_routing::{classify_complexity, Router, RouteQuery};
use gateway_telemetry::LogFormat;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::simulate::{self, SimulateArgs};

/// LLM Policy Gateway - routing, resilience, caching and budgets for LLM providers
#[derive(Parser, Debug)]
#[command(name = "llm-policy-gateway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding routing.yaml, resilience.yaml, caching.yaml and cost_control.yaml
    #[arg(short, long, env = POLICIES_PATH_ENV, default_value = "./policies", global = true)]
    pub policies: PathBuf,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "GATEWAY_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    /// Log output format (pretty, compact, json)
    #[arg(long, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and validate every policy document
    Validate,

    /// Show the routing decision for a query without calling anything
    Route(RouteArgs),

    /// Print the complexity class of a query
    Classify(ClassifyArgs),

    /// Run requests through the gateway against a simulated upstream
    Simulate(SimulateArgs),
}

/// Arguments for the route command.
#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Query text
    pub query: String,

    /// Requested provider
    #[arg(long)]
    pub provider: Option<String>,

    /// Requested model
    #[arg(long)]
    pub model: Option<String>,

    /// Agent name
    #[arg(long, default_value = gateway_core::DEFAULT_AGENT)]
    pub agent: String,

    /// Cost mode override (cost_optimized, balanced, quality_optimized)
    #[arg(long)]
    pub cost_mode: Option<CostMode>,

    /// Do not build a fallback chain
    #[arg(long)]
    pub no_fallback: bool,
}

/// Arguments for the classify command.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Query text
    pub query: String,
}

#[derive(Debug, Serialize)]
struct ValidationSummary {
    valid: bool,
    policies: String,
    routing: String,
    providers: Vec<String>,
    default_provider: String,
    retry_strategies: usize,
    circuit_breakers: usize,
    degradation_rules: usize,
    caching_enabled: bool,
    semantic_enabled: bool,
    budget_enabled: bool,
    daily_limit: f64,
    monthly_limit: f64,
    pricing_entries: usize,
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let loader = PolicyLoader::new(&self.policies);
        match self.command {
            Commands::Validate => validate(&loader).await,
            Commands::Route(args) => route(&loader, &args).await,
            Commands::Classify(args) => {
                println!("{}", classify_complexity(&args.query));
                Ok(())
            }
            Commands::Simulate(args) => {
                let policies = load_policies(&loader).await?;
                simulate::execute(policies, args).await
            }
        }
    }
}

/// Strictly load every document from the policy directory
pub async fn load_policies(loader: &PolicyLoader) -> Result<PolicySet> {
    let policies = loader
        .try_load_all()
        .await
        .with_context(|| format!("failed to load policies from {}", loader.dir().display()))?;
    info!(dir = %loader.dir().display(), "Policies loaded");
    Ok(policies)
}

async fn validate(loader: &PolicyLoader) -> Result<()> {
    let set = load_policies(loader).await?;

    let summary = ValidationSummary {
        valid: true,
        policies: loader.dir().display().to_string(),
        routing: set.routing.name.clone(),
        providers: set.routing.providers.keys().cloned().collect(),
        default_provider: set.routing.default_provider.clone(),
        retry_strategies: set.resilience.retry_strategies.len(),
        circuit_breakers: set.resilience.circuit_breakers.len(),
        degradation_rules: set.resilience.degradation_rules.len(),
        caching_enabled: set.caching.enabled,
        semantic_enabled: set.caching.semantic_similarity.enabled,
        budget_enabled: set.cost_control.budget.enabled,
        daily_limit: set.cost_control.budget.daily_limit,
        monthly_limit: set.cost_control.budget.monthly_limit,
        pricing_entries: set.cost_control.pricing.len(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn route(loader: &PolicyLoader, args: &RouteArgs) -> Result<()> {
    let set = load_policies(loader).await?;
    let router = Router::new(gateway_config::shared(set.routing));

    let query = RouteQuery {
        requested_provider: args.provider.as_deref(),
        requested_model: args.model.as_deref(),
        query: &args.query,
        agent: &args.agent,
        cost_mode: args.cost_mode,
        want_fallback: !args.no_fallback,
    };
    let decision = router.select(&query);
    let plan = router.plan(&decision, gateway_core::DEFAULT_ENDPOINT);

    let output = serde_json::json!({
        "complexity": classify_complexity(&args.query),
        "decision": decision,
        "candidates": plan
            .candidates
            .iter()
            .map(|c| serde_json::json!({ "provider": c.provider, "model": c.model }))
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
