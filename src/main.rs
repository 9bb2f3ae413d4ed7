//! # LLM Policy Gateway
//!
//! Command-line front end for the policy gateway.
//!
//! ## Usage
//!
//! ```bash
//! # Validate the policy documents in ./policies
//! llm-policy-gateway validate
//!
//! # Show where a query would be routed
//! llm-policy-gateway route "Explain quicksort step by step"
//!
//! # Run 50 requests with openai failing 30% of the time
//! GATEWAY_POLICIES_PATH=/etc/gateway llm-policy-gateway simulate -n 50 --fail openai=0.3
//! ```

use anyhow::Result;
use clap::Parser;
use gateway_telemetry::{init_logging, LoggingConfig};

mod cli;
mod simulate;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = LoggingConfig::new(cli.log_level.clone()).with_format(cli.log_format);
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {e}");
    }

    cli.execute().await
}
