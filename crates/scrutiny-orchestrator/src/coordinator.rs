use crate::breaker::BreakerRegistry;
use crate::config::CoordinatorConfig;
use crate::consolidate;
use crate::health::{HealthAggregator, HealthReport};
use crate::registry::AnalyzerRegistry;
use crate::retry;
use crate::types::{
    category_counts, AnalyzerReport, CoordinationResult, RunRequest, RunSummary, SeverityCounts,
};
use chrono::Utc;
use futures_util::future::join_all;
use scrutiny_core::{AnalysisContext, Analyzer, ScrutinyError, ScrutinyResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Executes analysis runs over a registry of analyzers.
///
/// A run selects the eligible analyzers, orders them by declared
/// dependencies, executes them sequentially or in concurrency-bounded
/// batches with per-unit timeout and retry, and consolidates the
/// resulting findings. Unit failures are isolated into their reports
/// unless the request asks for fail-fast.
pub struct Coordinator {
    registry: Arc<AnalyzerRegistry>,
    config: CoordinatorConfig,
    breakers: Arc<BreakerRegistry>,
}

impl Coordinator {
    /// Creates a coordinator over `registry` with the given defaults.
    pub fn new(registry: Arc<AnalyzerRegistry>, config: CoordinatorConfig) -> Self {
        let breakers = Arc::new(BreakerRegistry::new(
            config.breaker_threshold,
            Duration::from_millis(config.breaker_cooldown_ms),
        ));
        Self {
            registry,
            config,
            breakers,
        }
    }

    /// Creates a coordinator sharing an externally-owned breaker registry.
    pub fn with_breakers(
        registry: Arc<AnalyzerRegistry>,
        config: CoordinatorConfig,
        breakers: Arc<BreakerRegistry>,
    ) -> Self {
        Self {
            registry,
            config,
            breakers,
        }
    }

    /// The breaker registry gating retry-able operation classes.
    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    /// The analyzer registry this coordinator runs over.
    pub fn registry(&self) -> &Arc<AnalyzerRegistry> {
        &self.registry
    }

    /// Polls analyzer health under the configured timeout discipline.
    pub async fn health(&self) -> HealthReport {
        HealthAggregator::new(Duration::from_millis(self.config.analyzer_timeout_ms))
            .check(&self.registry)
            .await
    }

    /// Runs an analysis request to completion.
    ///
    /// Returns `Err` only for run-level failures: a dependency cycle, an
    /// unknown analyzer name in the explicit selection, nothing eligible
    /// to run, an exceeded run timeout, or the first unit failure in
    /// fail-fast mode. Unit failures otherwise surface as reports with
    /// errors inside an `Ok` result.
    pub async fn run(&self, request: RunRequest) -> ScrutinyResult<CoordinationResult> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let config = match &request.config {
            Some(overridden) => {
                overridden.validate()?;
                overridden.clone()
            }
            None => self.config.clone(),
        };

        // Ordering errors are fatal and must precede any execution.
        let order = self.registry.execution_order()?;
        for unresolved in self.registry.validate_dependencies() {
            warn!(
                analyzer = %unresolved.analyzer,
                dependency = %unresolved.dependency,
                "declared dependency is not registered"
            );
        }

        let selected = self.select(&order, &request)?;
        if selected.is_empty() {
            return Err(ScrutinyError::Coordinator(
                "no analyzers eligible for this run".to_string(),
            ));
        }

        info!(
            run_id = %run_id,
            analyzers = selected.len(),
            parallel = request.parallel,
            fail_fast = request.fail_fast,
            "starting analysis run"
        );

        let context = AnalysisContext {
            target: request.target.clone(),
            options: request.options.clone(),
        };

        let execute = async {
            if request.parallel {
                self.run_batched(&selected, &context, &config, request.fail_fast)
                    .await
            } else {
                self.run_sequential(&selected, &context, &config, request.fail_fast)
                    .await
            }
        };

        let reports = match request.timeout_ms {
            Some(ms) => timeout(Duration::from_millis(ms), execute)
                .await
                .map_err(|_| {
                    ScrutinyError::Coordinator(format!("run timed out after {ms}ms"))
                })??,
            None => execute.await?,
        };

        let consolidation = consolidate::consolidate(&reports);
        let analyzers_run = reports.iter().map(|r| r.analyzer.clone()).collect();
        let analyzers_failed: Vec<String> = reports
            .iter()
            .filter(|r| r.failed())
            .map(|r| r.analyzer.clone())
            .collect();

        let summary = RunSummary {
            total_findings: consolidation.findings.len(),
            raw_findings: consolidation.raw_count,
            duplicates_removed: consolidation.duplicates_removed,
            by_severity: SeverityCounts::tally(&consolidation.findings),
            by_category: category_counts(&consolidation.findings),
            elapsed_ms: started.elapsed().as_millis() as u64,
            analyzers_run,
            analyzers_failed,
        };

        info!(
            run_id = %run_id,
            findings = summary.total_findings,
            duplicates_removed = summary.duplicates_removed,
            failed = summary.analyzers_failed.len(),
            elapsed_ms = summary.elapsed_ms,
            "analysis run complete"
        );

        Ok(CoordinationResult {
            run_id,
            reports,
            findings: consolidation.findings,
            summary,
        })
    }

    /// Resolves which analyzers a request runs, preserving `order`.
    ///
    /// Explicit selection overrides capability filtering: a unit named in
    /// the request runs even if its capabilities do not match the target.
    fn select(
        &self,
        order: &[Arc<dyn Analyzer>],
        request: &RunRequest,
    ) -> ScrutinyResult<Vec<Arc<dyn Analyzer>>> {
        match &request.analyzers {
            Some(names) => {
                for name in names {
                    if self.registry.get(name).is_none() {
                        return Err(ScrutinyError::Registry(format!(
                            "unknown analyzer '{name}' in run request"
                        )));
                    }
                }
                Ok(order
                    .iter()
                    .filter(|a| names.iter().any(|n| n == a.name()))
                    .map(Arc::clone)
                    .collect())
            }
            None => Ok(order
                .iter()
                .filter(|a| {
                    self.registry.is_enabled(a.name())
                        && a.capabilities().matches(&request.target)
                        && a.can_analyze(&request.target)
                })
                .map(Arc::clone)
                .collect()),
        }
    }

    async fn run_sequential(
        &self,
        selected: &[Arc<dyn Analyzer>],
        context: &AnalysisContext,
        config: &CoordinatorConfig,
        fail_fast: bool,
    ) -> ScrutinyResult<Vec<AnalyzerReport>> {
        let mut reports = Vec::with_capacity(selected.len());
        for analyzer in selected {
            let report = self.execute_one(Arc::clone(analyzer), context, config).await;
            let failed = report.failed();
            let name = report.analyzer.clone();
            reports.push(report);
            if failed && fail_fast {
                return Err(ScrutinyError::Coordinator(format!(
                    "run aborted: analyzer '{name}' failed"
                )));
            }
        }
        Ok(reports)
    }

    /// Runs batches drawn in order from the topologically-sorted
    /// selection. Every batch member settles before the next batch
    /// starts, which bounds peak concurrency and keeps dependency
    /// ordering intact across batches.
    async fn run_batched(
        &self,
        selected: &[Arc<dyn Analyzer>],
        context: &AnalysisContext,
        config: &CoordinatorConfig,
        fail_fast: bool,
    ) -> ScrutinyResult<Vec<AnalyzerReport>> {
        let mut reports = Vec::with_capacity(selected.len());
        for batch in partition_batches(selected, config.max_concurrency) {
            debug!(size = batch.len(), "starting batch");
            let futures: Vec<_> = batch
                .iter()
                .map(|a| self.execute_one(Arc::clone(a), context, config))
                .collect();
            let batch_reports = join_all(futures).await;

            let first_failure = batch_reports
                .iter()
                .find(|r| r.failed())
                .map(|r| r.analyzer.clone());
            reports.extend(batch_reports);

            if fail_fast {
                if let Some(name) = first_failure {
                    return Err(ScrutinyError::Coordinator(format!(
                        "run aborted: analyzer '{name}' failed"
                    )));
                }
            }
        }
        Ok(reports)
    }

    /// Executes one analyzer with circuit gating, timeout race, and
    /// retry with exponential backoff. Always yields a report; a unit
    /// that ultimately fails yields a synthesized report carrying the
    /// final error.
    async fn execute_one(
        &self,
        analyzer: Arc<dyn Analyzer>,
        context: &AnalysisContext,
        config: &CoordinatorConfig,
    ) -> AnalyzerReport {
        let name = analyzer.name().to_string();
        let version = analyzer.version().to_string();
        let started_at = Utc::now();
        let max_attempts = config.retry.max_retries + 1;
        let timeout_ms = config.analyzer_timeout_ms;
        let mut last_error: Option<ScrutinyError> = None;

        for attempt in 1..=max_attempts {
            if let Err(err) = self.breakers.acquire(&name).await {
                // Open circuit: fail immediately, no retry delay.
                warn!(analyzer = %name, attempt, "circuit open, attempt rejected");
                last_error = Some(err);
                break;
            }

            debug!(analyzer = %name, attempt, "executing analyzer");
            let outcome =
                timeout(Duration::from_millis(timeout_ms), analyzer.analyze(context)).await;
            let error = match outcome {
                Ok(Ok(findings)) => {
                    self.breakers.record_success(&name).await;
                    debug!(analyzer = %name, attempt, findings = findings.len(), "analyzer succeeded");
                    return AnalyzerReport::success(name, version, started_at, findings);
                }
                Ok(Err(err)) => err,
                // Dropping the raced future abandons the attempt;
                // cancellation beyond that is the analyzer's concern.
                Err(_) => ScrutinyError::Timeout {
                    analyzer: name.clone(),
                    ms: timeout_ms,
                },
            };

            self.breakers.record_failure(&name).await;
            if retry::is_recoverable(&error) && attempt < max_attempts {
                let delay = retry::backoff_delay(&config.retry, attempt);
                warn!(
                    analyzer = %name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "analyzer attempt failed, backing off"
                );
                last_error = Some(error);
                tokio::time::sleep(delay).await;
            } else {
                warn!(analyzer = %name, attempt, error = %error, "analyzer failed");
                last_error = Some(error);
                break;
            }
        }

        let errors = last_error.into_iter().map(|e| e.to_string()).collect();
        AnalyzerReport::failure(name, version, started_at, errors)
    }
}

/// Splits the ordered selection into batches of at most `size`, giving
/// analyzers that are not parallel-safe a batch of their own.
fn partition_batches(
    selected: &[Arc<dyn Analyzer>],
    size: usize,
) -> Vec<Vec<Arc<dyn Analyzer>>> {
    let size = size.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<Arc<dyn Analyzer>> = Vec::new();
    for analyzer in selected {
        if !analyzer.capabilities().parallel_safe {
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
            }
            batches.push(vec![Arc::clone(analyzer)]);
            continue;
        }
        current.push(Arc::clone(analyzer));
        if current.len() == size {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
