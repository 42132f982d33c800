use async_trait::async_trait;
use regex::Regex;
use scrutiny_core::{
    AnalysisContext, Analyzer, Capabilities, Finding, InputKind, ScrutinyError, ScrutinyResult,
    Severity,
};

/// Flags source files that define functions but carry no tests.
///
/// A coarse heuristic: a file counts as tested if it contains a test
/// marker (`#[test]`, `#[tokio::test]`, or a `def test_`/`it(`/`test(`
/// style definition) anywhere, or if a sibling file in the target looks
/// like its test file.
pub struct TestGapAnalyzer {
    function_pattern: Regex,
    test_pattern: Regex,
}

impl TestGapAnalyzer {
    /// Creates the analyzer, compiling its heuristics.
    pub fn new() -> ScrutinyResult<Self> {
        let function_pattern = Regex::new(r"\b(fn|def|function)\s+\w+\s*\(")
            .map_err(|e| ScrutinyError::Config(format!("invalid function pattern: {e}")))?;
        let test_pattern =
            Regex::new(r"#\[(tokio::)?test\]|\bdef test_|\bit\s*\(|\btest\s*\(")
                .map_err(|e| ScrutinyError::Config(format!("invalid test pattern: {e}")))?;
        Ok(Self {
            function_pattern,
            test_pattern,
        })
    }

    fn looks_like_test_file(path: &str) -> bool {
        path.contains("/tests/")
            || path.starts_with("tests/")
            || path.contains("_test.")
            || path.contains(".test.")
            || path.contains("test_")
    }
}

#[async_trait]
impl Analyzer for TestGapAnalyzer {
    fn name(&self) -> &str {
        "test-gap"
    }

    fn version(&self) -> &str {
        "0.9.1"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(vec![InputKind::Source], vec!["test-coverage"])
    }

    // Schedules after the security analyzers among independents.
    fn priority(&self) -> i32 {
        200
    }

    async fn analyze(&self, context: &AnalysisContext) -> ScrutinyResult<Vec<Finding>> {
        let mut findings = Vec::new();
        for file in &context.target.files {
            if Self::looks_like_test_file(&file.path) {
                continue;
            }
            let has_functions = self.function_pattern.is_match(&file.content);
            let has_tests = self.test_pattern.is_match(&file.content);
            if has_functions && !has_tests {
                findings.push(
                    Finding::new(
                        Severity::Low,
                        "test-coverage",
                        "Source file has no tests",
                        file.path.as_str(),
                    )
                    .with_description(
                        "The file defines functions but contains no test markers and no \
                         matching test file was provided.",
                    )
                    .with_rule("TST001")
                    .with_suggestion("Add unit tests covering the file's public functions")
                    .with_metadata("analyzer", self.name()),
                );
            }
        }
        Ok(findings)
    }
}
