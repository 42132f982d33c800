use crate::config::CoordinatorConfig;
use chrono::{DateTime, Utc};
use scrutiny_core::{AnalysisTarget, Finding, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A request to run analysis over a target.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// What to analyze.
    pub target: AnalysisTarget,
    /// Explicit subset of analyzer names to run. `None` selects all
    /// enabled analyzers applicable to the target. Explicit selection
    /// overrides capability filtering.
    pub analyzers: Option<Vec<String>>,
    /// Per-run analyzer option overrides.
    pub options: HashMap<String, serde_json::Value>,
    /// Run units concurrently in bounded batches rather than one at a time.
    pub parallel: bool,
    /// Abort the whole run on the first unit failure.
    pub fail_fast: bool,
    /// Overall wall-clock limit for the run, in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Configuration overriding the coordinator's defaults for this run.
    pub config: Option<CoordinatorConfig>,
}

impl RunRequest {
    /// Creates a sequential, tolerant request for the given target.
    pub fn new(target: AnalysisTarget) -> Self {
        Self {
            target,
            analyzers: None,
            options: HashMap::new(),
            parallel: false,
            fail_fast: false,
            timeout_ms: None,
            config: None,
        }
    }

    /// Restricts the run to the named analyzers.
    pub fn with_analyzers(mut self, names: Vec<&str>) -> Self {
        self.analyzers = Some(names.into_iter().map(String::from).collect());
        self
    }

    /// Adds one analyzer option override.
    pub fn with_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Enables concurrent batch execution.
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Enables fail-fast mode.
    pub fn fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }

    /// Sets the overall run timeout.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Overrides the coordinator configuration for this run.
    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// Finding counts broken down by severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// Number of critical findings.
    pub critical: usize,
    /// Number of high findings.
    pub high: usize,
    /// Number of medium findings.
    pub medium: usize,
    /// Number of low findings.
    pub low: usize,
    /// Number of informational findings.
    pub info: usize,
}

impl SeverityCounts {
    /// Tallies the findings by severity.
    pub fn tally(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }

    /// Total findings across all severities.
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// Tallies findings by category.
pub(crate) fn category_counts(findings: &[Finding]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for finding in findings {
        *counts.entry(finding.category.clone()).or_default() += 1;
    }
    counts
}

/// The outcome of one analyzer's execution within a run.
///
/// Exactly one report exists per scheduled analyzer: a unit that fails
/// after exhausting its retries still yields a report, with zero findings
/// and the failure recorded in `errors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerReport {
    /// Name of the analyzer that produced this report.
    pub analyzer: String,
    /// Version of the analyzer.
    pub version: String,
    /// When execution of this unit started.
    pub started_at: DateTime<Utc>,
    /// When execution of this unit finished (success or final failure).
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// The findings the analyzer emitted, in emission order.
    pub findings: Vec<Finding>,
    /// Finding counts by severity.
    pub by_severity: SeverityCounts,
    /// Finding counts by category.
    pub by_category: HashMap<String, usize>,
    /// Unit-local errors. Non-empty exactly when the unit failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl AnalyzerReport {
    /// Builds a report for a successful execution.
    pub fn success(
        analyzer: impl Into<String>,
        version: impl Into<String>,
        started_at: DateTime<Utc>,
        findings: Vec<Finding>,
    ) -> Self {
        let by_severity = SeverityCounts::tally(&findings);
        let by_category = category_counts(&findings);
        let finished_at = Utc::now();
        Self {
            analyzer: analyzer.into(),
            version: version.into(),
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
            findings,
            by_severity,
            by_category,
            errors: Vec::new(),
        }
    }

    /// Builds a synthesized report for a failed execution.
    pub fn failure(
        analyzer: impl Into<String>,
        version: impl Into<String>,
        started_at: DateTime<Utc>,
        errors: Vec<String>,
    ) -> Self {
        let finished_at = Utc::now();
        Self {
            analyzer: analyzer.into(),
            version: version.into(),
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
            findings: Vec::new(),
            by_severity: SeverityCounts::default(),
            by_category: HashMap::new(),
            errors,
        }
    }

    /// Whether the unit ultimately failed.
    pub fn failed(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Aggregate statistics for one coordination run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Consolidated finding count.
    pub total_findings: usize,
    /// Finding count before deduplication.
    pub raw_findings: usize,
    /// Findings removed as duplicates.
    pub duplicates_removed: usize,
    /// Consolidated finding counts by severity.
    pub by_severity: SeverityCounts,
    /// Consolidated finding counts by category.
    pub by_category: HashMap<String, usize>,
    /// Wall-clock duration of the run in milliseconds.
    pub elapsed_ms: u64,
    /// Names of the analyzers that were scheduled, in execution order.
    pub analyzers_run: Vec<String>,
    /// Names of the analyzers whose execution ultimately failed.
    pub analyzers_failed: Vec<String>,
}

/// Everything a run produces: per-unit reports, consolidated findings,
/// and the run summary. Handed to the caller and not retained by the
/// orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationResult {
    /// Unique identifier of this run.
    pub run_id: Uuid,
    /// One report per scheduled analyzer, in execution order.
    pub reports: Vec<AnalyzerReport>,
    /// The consolidated, severity-ordered findings.
    pub findings: Vec<Finding>,
    /// Aggregate run statistics.
    pub summary: RunSummary,
}
