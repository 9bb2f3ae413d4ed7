//! Token estimation and ceilings.

use gateway_config::TokenLimitConfig;
use thiserror::Error;

/// Characters per token used for estimates
pub const CHARS_PER_TOKEN: usize = 4;

/// Rough token count: one token per four characters, rounded up
#[must_use]
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    u32::try_from(chars.div_ceil(CHARS_PER_TOKEN)).unwrap_or(u32::MAX)
}

/// A broken token ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenLimitViolation {
    /// Prompt too long
    #[error("input tokens {tokens} exceed limit {limit}")]
    Input {
        /// Estimated tokens
        tokens: u32,
        /// Ceiling
        limit: u32,
    },

    /// Completion budget too large
    #[error("output tokens {tokens} exceed limit {limit}")]
    Output {
        /// Requested tokens
        tokens: u32,
        /// Ceiling
        limit: u32,
    },

    /// Prompt plus completion too large
    #[error("total tokens {tokens} exceed limit {limit}")]
    Total {
        /// Combined tokens
        tokens: u32,
        /// Ceiling
        limit: u32,
    },
}

/// Check token counts against the configured ceilings.
///
/// # Errors
/// Returns the first ceiling broken: input, output, then total.
pub fn check_token_limits(
    limits: &TokenLimitConfig,
    input_tokens: u32,
    output_tokens: u32,
) -> Result<(), TokenLimitViolation> {
    if !limits.enabled {
        return Ok(());
    }
    if input_tokens > limits.max_input_tokens {
        return Err(TokenLimitViolation::Input {
            tokens: input_tokens,
            limit: limits.max_input_tokens,
        });
    }
    if output_tokens > limits.max_output_tokens {
        return Err(TokenLimitViolation::Output {
            tokens: output_tokens,
            limit: limits.max_output_tokens,
        });
    }
    let total = input_tokens.saturating_add(output_tokens);
    if total > limits.max_total_tokens {
        return Err(TokenLimitViolation::Total {
            tokens: total,
            limit: limits.max_total_tokens,
        });
    }
    Ok(())
}
