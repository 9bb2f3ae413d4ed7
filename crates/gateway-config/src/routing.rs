//! Routing policy document.

use crate::error::{ConfigError, ConfigResult};
use crate::serde_helpers::{default_name, default_true, default_version};
use gateway_core::{CostMode, QueryComplexity};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Relative cost or quality level of a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Low
    Low,
    /// Medium
    #[default]
    Medium,
    /// High
    High,
}

impl Tier {
    /// Numeric rank, low = 1
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// Nominal quality score (0.0 - 1.0) used by cost-aware routing
    #[must_use]
    pub fn quality_score(self) -> f64 {
        match self {
            Self::Low => 0.5,
            Self::Medium => 0.75,
            Self::High => 0.9,
        }
    }
}

/// Per-provider routing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Lower value means higher priority
    #[serde(default)]
    pub priority: i32,

    /// Relative cost
    #[serde(default)]
    pub cost_tier: Tier,

    /// Relative answer quality
    #[serde(default)]
    pub quality_tier: Tier,

    /// Models in preference order
    #[serde(default)]
    pub models: Vec<String>,

    /// Whether the provider may be selected
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Provider-level call timeout
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            priority: 0,
            cost_tier: Tier::Medium,
            quality_tier: Tier::Medium,
            models: Vec::new(),
            enabled: true,
            timeout: None,
        }
    }
}

impl ProviderConfig {
    /// Create an enabled provider with the given priority and models
    pub fn new<I, S>(priority: i32, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            priority,
            models: models.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Set the cost tier
    #[must_use]
    pub fn with_cost_tier(mut self, tier: Tier) -> Self {
        self.cost_tier = tier;
        self
    }

    /// Set the quality tier
    #[must_use]
    pub fn with_quality_tier(mut self, tier: Tier) -> Self {
        self.quality_tier = tier;
        self
    }

    /// Enable or disable the provider
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the provider timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// First configured model
    #[must_use]
    pub fn first_model(&self) -> Option<&str> {
        self.models.first().map(String::as_str)
    }
}

/// Ordered fallbacks for a primary provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackChain {
    /// Provider this chain applies to
    pub primary: String,
    /// Providers tried after the primary, in order
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

/// Provider preference for one complexity level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityRule {
    /// Complexity this rule applies to
    pub complexity: QueryComplexity,
    /// Providers in preference order
    #[serde(default)]
    pub provider_preference: Vec<String>,
    /// Preferred model per provider
    #[serde(default)]
    pub model_preference: IndexMap<String, String>,
}

/// Cost versus quality trade-off settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostQualityConfig {
    /// Mode used when a request does not specify one
    #[serde(default)]
    pub mode: CostMode,
    /// Explicit provider to model mapping per mode, in preference order
    #[serde(default)]
    pub provider_mapping: IndexMap<CostMode, IndexMap<String, String>>,
}

/// Routing policy snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    /// Policy version
    #[serde(default = "default_version")]
    pub version: String,

    /// Policy name
    #[serde(default = "default_name")]
    pub name: String,

    /// Providers in configuration order
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,

    /// Fallback chains, first match wins
    #[serde(default)]
    pub fallback_chains: Vec<FallbackChain>,

    /// Complexity based provider preferences
    #[serde(default)]
    pub complexity_rules: Vec<ComplexityRule>,

    /// Cost versus quality settings
    #[serde(default)]
    pub cost_quality: CostQualityConfig,

    /// Provider used when nothing else matches
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used with the default provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Whether complexity and cost based selection runs
    #[serde(default = "default_true")]
    pub enable_auto_routing: bool,
}

fn default_provider() -> String {
    "openai".to_string()
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        let mut providers = IndexMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderConfig::new(1, ["gpt-4o-mini", "gpt-4o", "gpt-4-turbo"])
                .with_quality_tier(Tier::High),
        );
        providers.insert(
            "anthropic".to_string(),
            ProviderConfig::new(2, ["claude-3-haiku", "claude-3-sonnet", "claude-3-opus"])
                .with_quality_tier(Tier::High),
        );

        Self {
            version: default_version(),
            name: default_name(),
            providers,
            fallback_chains: vec![FallbackChain {
                primary: "openai".to_string(),
                fallbacks: vec!["anthropic".to_string()],
            }],
            complexity_rules: Vec::new(),
            cost_quality: CostQualityConfig::default(),
            default_provider: default_provider(),
            default_model: None,
            enable_auto_routing: true,
        }
    }
}

impl RoutingPolicy {
    /// Empty policy with only a default provider name
    pub fn empty(default_provider: impl Into<String>) -> Self {
        Self {
            providers: IndexMap::new(),
            fallback_chains: Vec::new(),
            default_provider: default_provider.into(),
            ..Default::default()
        }
    }

    /// Add or replace a provider, keeping its position if it already exists
    #[must_use]
    pub fn with_provider(mut self, name: impl Into<String>, config: ProviderConfig) -> Self {
        self.providers.insert(name.into(), config);
        self
    }

    /// Append a fallback chain
    #[must_use]
    pub fn with_fallback_chain<I, S>(mut self, primary: impl Into<String>, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_chains.push(FallbackChain {
            primary: primary.into(),
            fallbacks: fallbacks.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Enabled provider by name
    #[must_use]
    pub fn enabled_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name).filter(|p| p.enabled)
    }

    /// Enabled providers in configuration order
    pub fn enabled_providers(&self) -> impl Iterator<Item = (&String, &ProviderConfig)> {
        self.providers.iter().filter(|(_, p)| p.enabled)
    }

    /// Validate the policy
    ///
    /// # Errors
    /// Returns error if the default provider is blank or a provider is
    /// configured with a zero timeout
    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_provider.trim().is_empty() {
            return Err(ConfigError::invalid(
                "routing",
                "default_provider",
                "cannot be empty",
            ));
        }

        for (name, provider) in &self.providers {
            if provider.timeout.is_some_and(|t| t.is_zero()) {
                return Err(ConfigError::invalid(
                    "routing",
                    format!("providers.{name}.timeout"),
                    "must be greater than zero",
                ));
            }
        }

        Ok(())
    }
}
