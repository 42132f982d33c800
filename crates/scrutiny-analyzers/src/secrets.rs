use async_trait::async_trait;
use regex::Regex;
use scrutiny_core::{
    AnalysisContext, Analyzer, Capabilities, Finding, InputKind, ScrutinyError, ScrutinyResult,
    Severity,
};
use tracing::debug;

/// Detects credentials and API keys embedded directly in source.
pub struct HardcodedSecretAnalyzer {
    pattern: Regex,
}

impl HardcodedSecretAnalyzer {
    /// Creates the analyzer, compiling its detection pattern.
    pub fn new() -> ScrutinyResult<Self> {
        let pattern = Regex::new(
            r#"(?i)\b(api[_-]?key|secret|password|passwd|token|private[_-]?key)\b\s*[:=]\s*["'][^"']{8,}["']"#,
        )
        .map_err(|e| ScrutinyError::Config(format!("invalid secret pattern: {e}")))?;
        Ok(Self { pattern })
    }
}

#[async_trait]
impl Analyzer for HardcodedSecretAnalyzer {
    fn name(&self) -> &str {
        "secrets"
    }

    fn version(&self) -> &str {
        "1.2.0"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(vec![InputKind::Source], vec!["security"])
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn analyze(&self, context: &AnalysisContext) -> ScrutinyResult<Vec<Finding>> {
        let mut findings = Vec::new();
        for file in &context.target.files {
            for (index, line) in file.content.lines().enumerate() {
                if let Some(matched) = self.pattern.find(line) {
                    findings.push(
                        Finding::new(
                            Severity::High,
                            "security",
                            "Hardcoded credential",
                            file.path.as_str(),
                        )
                        .with_description(
                            "A credential value is embedded in the source. Anyone with read \
                             access to the repository can use it.",
                        )
                        .with_line(index as u32 + 1)
                        .with_column(matched.start() as u32 + 1)
                        .with_rule("SEC001")
                        .with_snippet(line.trim())
                        .with_suggestion(
                            "Load the value from an environment variable or a secret store",
                        )
                        .with_metadata("analyzer", self.name()),
                    );
                }
            }
        }
        debug!(files = context.target.files.len(), findings = findings.len(), "secret scan done");
        Ok(findings)
    }
}
