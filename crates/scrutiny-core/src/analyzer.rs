use crate::finding::Finding;
use crate::target::{AnalysisTarget, Capabilities};
use crate::ScrutinyResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything an analyzer receives for one run.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    /// The material to analyze.
    pub target: AnalysisTarget,
    /// Per-run option overrides, keyed by analyzer-defined names.
    pub options: HashMap<String, serde_json::Value>,
}

impl AnalysisContext {
    /// Creates a context for the given target with no option overrides.
    pub fn new(target: AnalysisTarget) -> Self {
        Self {
            target,
            options: HashMap::new(),
        }
    }

    /// Adds one option override.
    pub fn with_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Coarse health classification of an analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Fully operational.
    Healthy,
    /// Operational with reduced capability.
    Degraded,
    /// Not operational.
    Unhealthy,
}

/// Self-reported health of an analyzer, with an optional reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// The health classification.
    pub state: HealthState,
    /// Human-readable detail, set for degraded/unhealthy states.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When this status was produced.
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    /// A healthy status with no message.
    pub fn healthy() -> Self {
        Self {
            state: HealthState::Healthy,
            message: None,
            checked_at: Utc::now(),
        }
    }

    /// A degraded status with the given reason.
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            state: HealthState::Degraded,
            message: Some(message.into()),
            checked_at: Utc::now(),
        }
    }

    /// An unhealthy status with the given reason.
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            state: HealthState::Unhealthy,
            message: Some(message.into()),
            checked_at: Utc::now(),
        }
    }

    /// Whether the state is [`HealthState::Healthy`].
    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

/// The contract every analysis unit implements.
///
/// The orchestrator depends on nothing beyond this trait: registration,
/// ordering, scheduling, and health polling all go through it. Analyzers
/// own no shared mutable state; `analyze` receives an immutable context
/// and returns findings, which keeps units trivially isolatable.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Unique name the unit is registered under.
    fn name(&self) -> &str;

    /// Version of the unit implementation.
    fn version(&self) -> &str;

    /// Declared capabilities (input kinds, categories, parallel safety).
    fn capabilities(&self) -> Capabilities;

    /// Runs the analysis and returns the findings.
    ///
    /// Errors are captured into the unit's report by the coordinator;
    /// return [`crate::ScrutinyError::Fatal`] to suppress retries.
    async fn analyze(&self, context: &AnalysisContext) -> ScrutinyResult<Vec<Finding>>;

    /// Whether this unit applies to the given target. Defaults to `true`.
    fn can_analyze(&self, _target: &AnalysisTarget) -> bool {
        true
    }

    /// Scheduling priority among equally-ready units; lower runs earlier.
    fn priority(&self) -> i32 {
        100
    }

    /// Names of units that must run before this one.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Health probe. Defaults to healthy.
    ///
    /// An `Err` means the probe itself failed to complete, which is
    /// reported more severely than a unit that merely self-reports
    /// unhealthy.
    async fn health(&self) -> ScrutinyResult<HealthStatus> {
        Ok(HealthStatus::healthy())
    }
}

impl std::fmt::Debug for dyn Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}
