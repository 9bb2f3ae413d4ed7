//! Query complexity classification.

use gateway_core::QueryComplexity;

/// Words that mark a query as analysis or design work
pub const COMPLEX_INDICATORS: &[&str] = &[
    "analyze",
    "compare",
    "evaluate",
    "design",
    "architecture",
    "strategy",
    "optimize",
    "implement",
    "refactor",
    "migrate",
    "scalable",
    "distributed",
    "microservices",
    "performance",
];

const SIMPLE_MAX_CHARS: usize = 50;
const SIMPLE_MAX_WORDS: usize = 10;
const COMPLEX_MIN_CHARS: usize = 500;
const COMPLEX_MIN_WORDS: usize = 100;

/// Classify a query as simple, medium or complex.
///
/// Short queries are simple regardless of content. Longer ones are complex
/// when they contain an indicator word or exceed the length bounds.
#[must_use]
pub fn classify_complexity(query: &str) -> QueryComplexity {
    let chars = query.chars().count();
    let words = query.split_whitespace().count();

    if chars < SIMPLE_MAX_CHARS || words < SIMPLE_MAX_WORDS {
        return QueryComplexity::Simple;
    }

    let lowered = query.to_lowercase();
    if COMPLEX_INDICATORS.iter().any(|word| lowered.contains(word)) {
        return QueryComplexity::Complex;
    }

    if chars > COMPLEX_MIN_CHARS || words > COMPLEX_MIN_WORDS {
        return QueryComplexity::Complex;
    }

    QueryComplexity::Medium
}
