use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Severity of a [`Finding`], ordered from least to most severe.
///
/// The derived `Ord` makes severity comparisons direct: `Severity::Critical
/// > Severity::High` holds, so "keep the higher-severity variant" is a
/// plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational — no action required.
    Info,
    /// Low impact or very unlikely to be exploitable.
    Low,
    /// Moderate impact, should be addressed.
    Medium,
    /// High impact, should be addressed promptly.
    High,
    /// Critical impact, must be addressed immediately.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::Info => write!(f, "info"),
        }
    }
}

impl Severity {
    /// All severities from most to least severe, for stable iteration in
    /// summaries.
    pub const RANKED: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];
}

/// A single issue detected by an analyzer.
///
/// Findings are immutable once emitted; consolidation may merge the
/// `metadata` map of duplicates but never rewrites severity, category, or
/// location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// How severe the issue is.
    pub severity: Severity,
    /// The category of issue (e.g. `"security"`, `"test-coverage"`).
    pub category: String,
    /// Short human-readable title.
    pub title: String,
    /// Longer description of the issue and its impact.
    pub description: String,
    /// Source file the issue was found in.
    pub file: String,
    /// Line number, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Column number, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Identifier of the rule that produced this finding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// The offending code excerpt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// A suggested remediation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Arbitrary key-value metadata (provenance, analyzer-specific detail).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Finding {
    /// Creates a new finding with the required fields.
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        title: impl Into<String>,
        file: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            title: title.into(),
            description: String::new(),
            file: file.into(),
            line: None,
            column: None,
            rule: None,
            snippet: None,
            suggestion: None,
            metadata: HashMap::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the line number.
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Sets the column number.
    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }

    /// Sets the rule identifier.
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Sets the code snippet.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Sets the remediation suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Adds one metadata entry.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The key under which duplicates of this finding are grouped.
    ///
    /// Two findings with the same key are the same logical issue reported
    /// by multiple analyzers. Missing line/column count as 0.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.file,
            self.line.unwrap_or(0),
            self.column.unwrap_or(0),
            self.category,
            self.title
        )
    }
}
