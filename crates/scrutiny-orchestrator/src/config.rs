use scrutiny_core::{ScrutinyError, ScrutinyResult};
use serde::{Deserialize, Serialize};

/// Configures retry behaviour for analyzer execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt (2 retries means 3 attempts).
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 1_000,
            backoff_max_ms: 10_000,
        }
    }
}

/// Coordinator configuration: concurrency, timeouts, retry, breaker.
///
/// All fields have serde defaults so partial TOML configs work:
///
/// ```toml
/// max_concurrency = 4
/// analyzer_timeout_ms = 60000
///
/// [retry]
/// max_retries = 1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Maximum number of analyzers executing concurrently (batch size).
    pub max_concurrency: usize,
    /// Per-analyzer execution timeout in milliseconds.
    pub analyzer_timeout_ms: u64,
    /// Retry policy applied per analyzer.
    pub retry: RetryPolicy,
    /// Consecutive failures before a circuit breaker opens.
    pub breaker_threshold: u32,
    /// Cool-down before an open breaker transitions to half-open, in
    /// milliseconds.
    pub breaker_cooldown_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            analyzer_timeout_ms: 300_000,
            retry: RetryPolicy::default(),
            breaker_threshold: 5,
            breaker_cooldown_ms: 300_000,
        }
    }
}

impl CoordinatorConfig {
    /// Parses a configuration from a TOML document.
    pub fn from_toml_str(raw: &str) -> ScrutinyResult<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| ScrutinyError::Config(format!("invalid coordinator config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot schedule anything.
    pub fn validate(&self) -> ScrutinyResult<()> {
        if self.max_concurrency == 0 {
            return Err(ScrutinyError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.analyzer_timeout_ms == 0 {
            return Err(ScrutinyError::Config(
                "analyzer_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
