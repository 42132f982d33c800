//! End-to-end coordination tests.
//!
//! Exercises the full registry → coordinator → consolidator pipeline with
//! scripted mock analyzers: dependency ordering, batch concurrency,
//! timeout/retry, fail-fast isolation, circuit breaking, and finding
//! consolidation. Timing-sensitive tests run under tokio's paused clock
//! so they are deterministic.

use async_trait::async_trait;
use scrutiny_analyzers::{DangerousCallAnalyzer, HardcodedSecretAnalyzer, TestGapAnalyzer};
use scrutiny_core::{
    AnalysisContext, AnalysisTarget, Analyzer, Capabilities, Finding, InputKind, ScrutinyError,
    ScrutinyResult, Severity, SourceFile,
};
use scrutiny_orchestrator::{AnalyzerRegistry, Coordinator, CoordinatorConfig, RetryPolicy, RunRequest};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Scripted mock analyzer
// ---------------------------------------------------------------------------

enum Behaviour {
    /// Return the given findings immediately.
    Findings(Vec<Finding>),
    /// Fail every attempt with a recoverable error.
    FailAlways,
    /// Fail every attempt with a fatal (non-recoverable) error.
    FailFatal,
    /// Fail the first `n` attempts, then return the findings.
    FailThenSucceed(u32, Vec<Finding>),
    /// Sleep for the duration, then return nothing.
    Sleep(Duration),
    /// Sleep effectively forever (forces the timeout race to win).
    Hang,
}

struct MockAnalyzer {
    name: String,
    behaviour: Behaviour,
    priority: i32,
    dependencies: Vec<String>,
    calls: Arc<AtomicU32>,
    log: Option<Arc<Mutex<Vec<String>>>>,
}

impl MockAnalyzer {
    fn new(name: &str, behaviour: Behaviour) -> Self {
        Self {
            name: name.to_string(),
            behaviour,
            priority: 100,
            dependencies: Vec::new(),
            calls: Arc::new(AtomicU32::new(0)),
            log: None,
        }
    }

    fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn with_dependencies(mut self, dependencies: Vec<&str>) -> Self {
        self.dependencies = dependencies.into_iter().map(String::from).collect();
        self
    }

    fn with_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.log = Some(log);
        self
    }

    fn call_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "0.0.1"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(vec![InputKind::Source], vec!["mock"])
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    async fn analyze(&self, _context: &AnalysisContext) -> ScrutinyResult<Vec<Finding>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(log) = &self.log {
            log.lock().unwrap().push(self.name.clone());
        }
        match &self.behaviour {
            Behaviour::Findings(findings) => Ok(findings.clone()),
            Behaviour::FailAlways => Err(ScrutinyError::Analyzer(format!(
                "{} exploded on attempt {call}",
                self.name
            ))),
            Behaviour::FailFatal => Err(ScrutinyError::Fatal(format!(
                "{} cannot analyze this target",
                self.name
            ))),
            Behaviour::FailThenSucceed(failures, findings) => {
                if call <= *failures {
                    Err(ScrutinyError::Analyzer(format!(
                        "{} transient failure {call}",
                        self.name
                    )))
                } else {
                    Ok(findings.clone())
                }
            }
            Behaviour::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(Vec::new())
            }
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(86_400)).await;
                Ok(Vec::new())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        max_concurrency: 3,
        analyzer_timeout_ms: 50,
        retry: RetryPolicy {
            max_retries: 2,
            backoff_base_ms: 1,
            backoff_max_ms: 5,
        },
        breaker_threshold: 5,
        breaker_cooldown_ms: 60_000,
    }
}

fn coordinator(registry: AnalyzerRegistry, config: CoordinatorConfig) -> Coordinator {
    Coordinator::new(Arc::new(registry), config)
}

fn target() -> AnalysisTarget {
    AnalysisTarget::new("/tmp/proj", vec![SourceFile::new("src/lib.rs", "fn a() {}")])
}

fn finding(severity: Severity, title: &str, line: u32) -> Finding {
    Finding::new(severity, "security", title, "src/lib.rs").with_line(line)
}

// ---------------------------------------------------------------------------
// Report cardinality and failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_report_per_scheduled_unit_even_on_failure() {
    let mut registry = AnalyzerRegistry::new();
    registry
        .register(MockAnalyzer::new(
            "good",
            Behaviour::Findings(vec![finding(Severity::Low, "issue", 1)]),
        ))
        .unwrap();
    registry
        .register(MockAnalyzer::new("bad", Behaviour::FailAlways))
        .unwrap();
    registry
        .register(MockAnalyzer::new("also-good", Behaviour::Findings(Vec::new())))
        .unwrap();

    let result = coordinator(registry, fast_config())
        .run(RunRequest::new(target()))
        .await
        .unwrap();

    assert_eq!(result.reports.len(), 3);
    assert_eq!(result.summary.analyzers_run.len(), 3);
    assert_eq!(result.summary.analyzers_failed, vec!["bad"]);

    let bad = result.reports.iter().find(|r| r.analyzer == "bad").unwrap();
    assert!(bad.failed());
    assert!(bad.findings.is_empty());
    assert_eq!(bad.errors.len(), 1);
}

#[tokio::test]
async fn failure_does_not_corrupt_other_reports() {
    let mut registry = AnalyzerRegistry::new();
    registry
        .register(MockAnalyzer::new(
            "steady",
            Behaviour::Findings(vec![finding(Severity::Medium, "kept", 5)]),
        ))
        .unwrap();
    registry
        .register(MockAnalyzer::new("flaky", Behaviour::FailAlways))
        .unwrap();

    let result = coordinator(registry, fast_config())
        .run(RunRequest::new(target()).parallel())
        .await
        .unwrap();

    let steady = result.reports.iter().find(|r| r.analyzer == "steady").unwrap();
    assert!(!steady.failed());
    assert_eq!(steady.findings.len(), 1);
    assert_eq!(result.findings.len(), 1);
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sequential_execution_respects_dependencies() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = AnalyzerRegistry::new();
    // Priorities deliberately oppose the dependency order.
    registry
        .register(
            MockAnalyzer::new("last", Behaviour::Findings(Vec::new()))
                .with_priority(1)
                .with_dependencies(vec!["middle"])
                .with_log(Arc::clone(&log)),
        )
        .unwrap();
    registry
        .register(
            MockAnalyzer::new("middle", Behaviour::Findings(Vec::new()))
                .with_priority(50)
                .with_dependencies(vec!["first"])
                .with_log(Arc::clone(&log)),
        )
        .unwrap();
    registry
        .register(
            MockAnalyzer::new("first", Behaviour::Findings(Vec::new()))
                .with_priority(900)
                .with_log(Arc::clone(&log)),
        )
        .unwrap();

    coordinator(registry, fast_config())
        .run(RunRequest::new(target()))
        .await
        .unwrap();

    let order = log.lock().unwrap().clone();
    assert_eq!(order, vec!["first", "middle", "last"]);
}

#[tokio::test]
async fn cycle_fails_before_any_unit_runs() {
    let mut registry = AnalyzerRegistry::new();
    let a = MockAnalyzer::new("a", Behaviour::Findings(Vec::new())).with_dependencies(vec!["b"]);
    let b = MockAnalyzer::new("b", Behaviour::Findings(Vec::new())).with_dependencies(vec!["a"]);
    let a_calls = a.call_counter();
    let b_calls = b.call_counter();
    registry.register(a).unwrap();
    registry.register(b).unwrap();

    let err = coordinator(registry, fast_config())
        .run(RunRequest::new(target()))
        .await
        .unwrap_err();

    assert!(matches!(err, ScrutinyError::DependencyCycle { .. }));
    assert_eq!(a_calls.load(Ordering::SeqCst), 0);
    assert_eq!(b_calls.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn batches_bound_concurrency_to_ceiling_of_n_over_k() {
    let mut registry = AnalyzerRegistry::new();
    for name in ["a", "b", "c", "d", "e"] {
        registry
            .register(MockAnalyzer::new(
                name,
                Behaviour::Sleep(Duration::from_millis(100)),
            ))
            .unwrap();
    }

    let config = CoordinatorConfig {
        max_concurrency: 2,
        analyzer_timeout_ms: 1_000,
        ..fast_config()
    };

    let started = tokio::time::Instant::now();
    let result = coordinator(registry, config)
        .run(RunRequest::new(target()).parallel())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    // ceil(5 / 2) = 3 batches of 100ms each: neither 5x (sequential)
    // nor 1x (unbounded fan-out).
    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "elapsed {elapsed:?}");
    assert_eq!(result.reports.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn sequential_runs_one_at_a_time() {
    let mut registry = AnalyzerRegistry::new();
    for name in ["a", "b", "c"] {
        registry
            .register(MockAnalyzer::new(
                name,
                Behaviour::Sleep(Duration::from_millis(100)),
            ))
            .unwrap();
    }

    let config = CoordinatorConfig {
        analyzer_timeout_ms: 1_000,
        ..fast_config()
    };
    let started = tokio::time::Instant::now();
    coordinator(registry, config)
        .run(RunRequest::new(target()))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
}

// ---------------------------------------------------------------------------
// Timeout and retry
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn timeout_unit_gets_exactly_retries_plus_one_attempts() {
    let mut registry = AnalyzerRegistry::new();
    let hanger = MockAnalyzer::new("hanger", Behaviour::Hang);
    let calls = hanger.call_counter();
    registry.register(hanger).unwrap();

    let result = coordinator(registry, fast_config())
        .run(RunRequest::new(target()))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let report = &result.reports[0];
    assert!(report.findings.is_empty());
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn transient_failure_recovers_within_retry_budget() {
    let mut registry = AnalyzerRegistry::new();
    let flaky = MockAnalyzer::new(
        "flaky",
        Behaviour::FailThenSucceed(2, vec![finding(Severity::High, "found it", 3)]),
    );
    let calls = flaky.call_counter();
    registry.register(flaky).unwrap();

    let result = coordinator(registry, fast_config())
        .run(RunRequest::new(target()))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let report = &result.reports[0];
    assert!(!report.failed());
    assert_eq!(report.findings.len(), 1);
    assert!(result.summary.analyzers_failed.is_empty());
}

#[tokio::test]
async fn fatal_failure_aborts_retries_immediately() {
    let mut registry = AnalyzerRegistry::new();
    let doomed = MockAnalyzer::new("doomed", Behaviour::FailFatal);
    let calls = doomed.call_counter();
    registry.register(doomed).unwrap();

    let result = coordinator(registry, fast_config())
        .run(RunRequest::new(target()))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(result.reports[0].failed());
}

#[tokio::test(start_paused = true)]
async fn overall_run_timeout_aborts_the_run() {
    let mut registry = AnalyzerRegistry::new();
    registry
        .register(MockAnalyzer::new(
            "slow",
            Behaviour::Sleep(Duration::from_millis(40)),
        ))
        .unwrap();
    registry
        .register(MockAnalyzer::new(
            "slower",
            Behaviour::Sleep(Duration::from_millis(40)),
        ))
        .unwrap();

    let err = coordinator(registry, fast_config())
        .run(RunRequest::new(target()).with_timeout_ms(50))
        .await
        .unwrap_err();

    assert!(matches!(err, ScrutinyError::Coordinator(_)));
    assert!(err.to_string().contains("timed out"));
}

// ---------------------------------------------------------------------------
// Fail-fast
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn fail_fast_stops_later_units_and_names_the_culprit() {
    let mut registry = AnalyzerRegistry::new();
    let a = MockAnalyzer::new("a", Behaviour::Findings(Vec::new())).with_priority(1);
    let b = MockAnalyzer::new("b", Behaviour::FailAlways).with_priority(2);
    let c = MockAnalyzer::new("c", Behaviour::Findings(Vec::new())).with_priority(3);
    let b_calls = b.call_counter();
    let c_calls = c.call_counter();
    registry.register(a).unwrap();
    registry.register(b).unwrap();
    registry.register(c).unwrap();

    let config = CoordinatorConfig {
        max_concurrency: 1,
        ..fast_config()
    };
    let err = coordinator(registry, config)
        .run(RunRequest::new(target()).fail_fast())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("'b'"));
    // b exhausted its retry budget before the abort.
    assert_eq!(b_calls.load(Ordering::SeqCst), 3);
    assert_eq!(c_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn tolerant_mode_runs_everything() {
    let mut registry = AnalyzerRegistry::new();
    let a = MockAnalyzer::new("a", Behaviour::Findings(Vec::new())).with_priority(1);
    let b = MockAnalyzer::new("b", Behaviour::FailAlways).with_priority(2);
    let c = MockAnalyzer::new("c", Behaviour::Findings(Vec::new())).with_priority(3);
    let c_calls = c.call_counter();
    registry.register(a).unwrap();
    registry.register(b).unwrap();
    registry.register(c).unwrap();

    let result = coordinator(registry, fast_config())
        .run(RunRequest::new(target()))
        .await
        .unwrap();

    assert_eq!(c_calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.reports.len(), 3);
    assert_eq!(result.summary.analyzers_failed, vec!["b"]);
}

// ---------------------------------------------------------------------------
// Circuit breaker
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn open_circuit_rejects_attempts_until_reset() {
    let mut registry = AnalyzerRegistry::new();
    let flaky = MockAnalyzer::new("flaky", Behaviour::FailAlways);
    let calls = flaky.call_counter();
    registry.register(flaky).unwrap();

    let config = CoordinatorConfig {
        breaker_threshold: 2,
        retry: RetryPolicy {
            max_retries: 0,
            backoff_base_ms: 1,
            backoff_max_ms: 1,
        },
        ..fast_config()
    };
    let coordinator = coordinator(registry, config);

    // Two failing runs trip the breaker.
    coordinator.run(RunRequest::new(target())).await.unwrap();
    coordinator.run(RunRequest::new(target())).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Third run is rejected without invoking the analyzer.
    let result = coordinator.run(RunRequest::new(target())).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(result.reports[0].errors[0].contains("Circuit open"));

    // Reset restores normal attempts.
    coordinator.breakers().reset().await;
    coordinator.run(RunRequest::new(target())).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

// ---------------------------------------------------------------------------
// Consolidation across units
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_findings_across_units_merge_with_severity_upgrade() {
    let mut registry = AnalyzerRegistry::new();
    registry
        .register(
            MockAnalyzer::new(
                "first",
                Behaviour::Findings(vec![finding(Severity::Low, "shared issue", 10)
                    .with_metadata("seen_by", "first")]),
            )
            .with_priority(1),
        )
        .unwrap();
    registry
        .register(
            MockAnalyzer::new(
                "second",
                Behaviour::Findings(vec![finding(Severity::Critical, "shared issue", 10)
                    .with_metadata("confirmed_by", "second")]),
            )
            .with_priority(2),
        )
        .unwrap();

    let result = coordinator(registry, fast_config())
        .run(RunRequest::new(target()))
        .await
        .unwrap();

    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.summary.duplicates_removed, 1);
    assert_eq!(result.summary.raw_findings, 2);
    let merged = &result.findings[0];
    assert_eq!(merged.severity, Severity::Critical);
    assert_eq!(merged.metadata["seen_by"], "first");
    assert_eq!(merged.metadata["confirmed_by"], "second");
    assert_eq!(result.summary.by_severity.critical, 1);
}

// ---------------------------------------------------------------------------
// Real analyzers end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bundled_analyzers_end_to_end() {
    let mut registry = AnalyzerRegistry::new();
    registry
        .register(HardcodedSecretAnalyzer::new().unwrap())
        .unwrap();
    registry
        .register(DangerousCallAnalyzer::new().unwrap())
        .unwrap();
    registry.register(TestGapAnalyzer::new().unwrap()).unwrap();

    let target = AnalysisTarget::new(
        "/tmp/proj",
        vec![
            SourceFile::new(
                "src/handler.py",
                "def run(user_input):\n    return eval(user_input)\n",
            ),
            SourceFile::new(
                "src/config.py",
                "password = \"correct-horse-battery\"\n",
            ),
        ],
    );

    let result = coordinator(registry, CoordinatorConfig::default())
        .run(RunRequest::new(target).parallel())
        .await
        .unwrap();

    assert_eq!(result.reports.len(), 3);
    // Critical (eval) sorts ahead of high (credential) and low (test gap).
    assert_eq!(result.findings[0].severity, Severity::Critical);
    let categories: Vec<&str> = result
        .findings
        .iter()
        .map(|f| f.category.as_str())
        .collect();
    assert!(categories.contains(&"security"));
    assert!(categories.contains(&"test-coverage"));
    assert!(result.summary.analyzers_failed.is_empty());
}
