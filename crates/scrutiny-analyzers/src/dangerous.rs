use async_trait::async_trait;
use regex::Regex;
use scrutiny_core::{
    AnalysisContext, Analyzer, Capabilities, Finding, InputKind, ScrutinyError, ScrutinyResult,
    Severity,
};

struct Rule {
    id: &'static str,
    pattern: Regex,
    title: &'static str,
    description: &'static str,
    severity: Severity,
}

/// Detects calls that evaluate arbitrary code or shell out to commands.
pub struct DangerousCallAnalyzer {
    rules: Vec<Rule>,
}

impl DangerousCallAnalyzer {
    /// Creates the analyzer with its built-in rule set.
    pub fn new() -> ScrutinyResult<Self> {
        let specs: [(&str, &str, &str, &str, Severity); 3] = [
            (
                "SEC010",
                r"\beval\s*\(",
                "Dynamic code evaluation",
                "eval executes arbitrary code from a runtime value, which turns any \
                 injection into code execution.",
                Severity::Critical,
            ),
            (
                "SEC011",
                r"\b(system|popen|exec[lv]p?e?)\s*\(",
                "Shell command execution",
                "Spawning a shell from a composed string allows command injection when \
                 any component is attacker-influenced.",
                Severity::High,
            ),
            (
                "SEC012",
                r"(?i)\b(md5|sha1)\s*\(",
                "Weak hash algorithm",
                "MD5 and SHA-1 are broken for collision resistance and must not protect \
                 integrity or passwords.",
                Severity::Medium,
            ),
        ];

        let mut rules = Vec::with_capacity(specs.len());
        for (id, pattern, title, description, severity) in specs {
            rules.push(Rule {
                id,
                pattern: Regex::new(pattern)
                    .map_err(|e| ScrutinyError::Config(format!("invalid rule {id}: {e}")))?,
                title,
                description,
                severity,
            });
        }
        Ok(Self { rules })
    }
}

#[async_trait]
impl Analyzer for DangerousCallAnalyzer {
    fn name(&self) -> &str {
        "dangerous-calls"
    }

    fn version(&self) -> &str {
        "1.0.3"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(vec![InputKind::Source], vec!["security"])
    }

    fn priority(&self) -> i32 {
        20
    }

    async fn analyze(&self, context: &AnalysisContext) -> ScrutinyResult<Vec<Finding>> {
        let mut findings = Vec::new();
        for file in &context.target.files {
            for (index, line) in file.content.lines().enumerate() {
                for rule in &self.rules {
                    if let Some(matched) = rule.pattern.find(line) {
                        findings.push(
                            Finding::new(rule.severity, "security", rule.title, file.path.as_str())
                                .with_description(rule.description)
                                .with_line(index as u32 + 1)
                                .with_column(matched.start() as u32 + 1)
                                .with_rule(rule.id)
                                .with_snippet(line.trim())
                                .with_metadata("analyzer", self.name()),
                        );
                    }
                }
            }
        }
        Ok(findings)
    }
}
