//! YAML policy loading.
//!
//! Each policy lives in its own document under a top-level key
//! (`routing:`, `resilience:`, `caching:`, `cost_control:`). Strict parsing
//! fails fast with a [`ConfigError`]; [`PolicyLoader::load`] instead falls
//! back to defaults and logs, so a bad file never takes the gateway down.

use crate::caching::CachingPolicy;
use crate::cost::CostControlPolicy;
use crate::error::{ConfigError, ConfigResult};
use crate::resilience::ResiliencePolicy;
use crate::routing::RoutingPolicy;
use crate::store::PolicySet;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the policy directory
pub const POLICIES_PATH_ENV: &str = "GATEWAY_POLICIES_PATH";

/// Directory used when the environment variable is unset
pub const DEFAULT_POLICIES_PATH: &str = "./policies";

/// A policy document that can be read from YAML
pub trait PolicyDocument: DeserializeOwned + Default + Send + Sync + 'static {
    /// Top-level key and human name of the document
    const DOCUMENT: &'static str;

    /// File name inside the policy directory
    const FILE_NAME: &'static str;

    /// Validate the parsed document
    fn check(&self) -> ConfigResult<()>;
}

impl PolicyDocument for RoutingPolicy {
    const DOCUMENT: &'static str = "routing";
    const FILE_NAME: &'static str = "routing.yaml";

    fn check(&self) -> ConfigResult<()> {
        self.validate()
    }
}

impl PolicyDocument for ResiliencePolicy {
    const DOCUMENT: &'static str = "resilience";
    const FILE_NAME: &'static str = "resilience.yaml";

    fn check(&self) -> ConfigResult<()> {
        self.validate()
    }
}

impl PolicyDocument for CachingPolicy {
    const DOCUMENT: &'static str = "caching";
    const FILE_NAME: &'static str = "caching.yaml";

    fn check(&self) -> ConfigResult<()> {
        self.validate()
    }
}

impl PolicyDocument for CostControlPolicy {
    const DOCUMENT: &'static str = "cost_control";
    const FILE_NAME: &'static str = "cost_control.yaml";

    fn check(&self) -> ConfigResult<()> {
        self.validate()
    }
}

/// Parse and validate a policy document
///
/// # Errors
/// Returns `ConfigError::Parse` if the YAML is malformed, the top-level key is
/// missing, or a value has the wrong type; `ConfigError::Invalid` if
/// validation fails
pub fn parse_policy<T: PolicyDocument>(source: &str) -> ConfigResult<T> {
    let mut root: serde_yaml::Value =
        serde_yaml::from_str(source).map_err(|e| ConfigError::parse(T::DOCUMENT, e))?;

    let body = root
        .as_mapping_mut()
        .and_then(|map| map.remove(T::DOCUMENT))
        .ok_or_else(|| {
            ConfigError::parse(T::DOCUMENT, format!("missing top-level '{}' key", T::DOCUMENT))
        })?;

    // An empty section (`routing:` with nothing under it) means all defaults
    let policy: T = if body.is_null() {
        T::default()
    } else {
        serde_yaml::from_value(body).map_err(|e| ConfigError::parse(T::DOCUMENT, e))?
    };
    policy.check()?;
    Ok(policy)
}

/// Parse a routing policy document
///
/// # Errors
/// See [`parse_policy`]
pub fn parse_routing(source: &str) -> ConfigResult<RoutingPolicy> {
    parse_policy(source)
}

/// Parse a resilience policy document
///
/// # Errors
/// See [`parse_policy`]
pub fn parse_resilience(source: &str) -> ConfigResult<ResiliencePolicy> {
    parse_policy(source)
}

/// Parse a caching policy document
///
/// # Errors
/// See [`parse_policy`]
pub fn parse_caching(source: &str) -> ConfigResult<CachingPolicy> {
    parse_policy(source)
}

/// Parse a cost control policy document
///
/// # Errors
/// See [`parse_policy`]
pub fn parse_cost_control(source: &str) -> ConfigResult<CostControlPolicy> {
    parse_policy(source)
}

/// Reads policy documents from a directory
#[derive(Debug, Clone)]
pub struct PolicyLoader {
    dir: PathBuf,
}

impl PolicyLoader {
    /// Create a loader for `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create a loader from `GATEWAY_POLICIES_PATH`
    #[must_use]
    pub fn from_env() -> Self {
        let dir = std::env::var(POLICIES_PATH_ENV).unwrap_or_else(|_| DEFAULT_POLICIES_PATH.to_string());
        Self::new(dir)
    }

    /// Policy directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a document inside the policy directory
    #[must_use]
    pub fn path_for<T: PolicyDocument>(&self) -> PathBuf {
        self.dir.join(T::FILE_NAME)
    }

    /// Load a document, failing on malformed or invalid content
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated
    pub async fn try_load<T: PolicyDocument>(&self) -> ConfigResult<Option<T>> {
        let path = self.path_for::<T>();
        let source = match tokio::fs::read_to_string(&path).await {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        parse_policy(&source).map(Some)
    }

    /// Load a document, falling back to defaults on any problem
    pub async fn load<T: PolicyDocument>(&self) -> T {
        match self.try_load::<T>().await {
            Ok(Some(policy)) => {
                info!(
                    document = T::DOCUMENT,
                    path = %self.path_for::<T>().display(),
                    "Policy loaded"
                );
                policy
            }
            Ok(None) => {
                info!(document = T::DOCUMENT, "No policy file found, using defaults");
                T::default()
            }
            Err(e) => {
                warn!(
                    document = T::DOCUMENT,
                    error = %e,
                    "Failed to load policy, using defaults"
                );
                T::default()
            }
        }
    }

    /// Load all four documents leniently
    pub async fn load_all(&self) -> PolicySet {
        PolicySet {
            routing: self.load().await,
            resilience: self.load().await,
            caching: self.load().await,
            cost_control: self.load().await,
        }
    }

    /// Load all four documents strictly; missing files mean defaults
    ///
    /// # Errors
    /// Returns the first read, parse or validation error
    pub async fn try_load_all(&self) -> ConfigResult<PolicySet> {
        Ok(PolicySet {
            routing: self.try_load().await?.unwrap_or_default(),
            resilience: self.try_load().await?.unwrap_or_default(),
            caching: self.try_load().await?.unwrap_or_default(),
            cost_control: self.try_load().await?.unwrap_or_default(),
        })
    }
}
