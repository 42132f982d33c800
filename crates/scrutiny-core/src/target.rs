use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The kind of input material an analyzer can operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Program source files.
    Source,
    /// Build and dependency manifests.
    Manifest,
    /// Project documentation.
    Docs,
}

/// One file handed to analyzers, with its content preloaded.
///
/// Loading happens before a run starts so analyzers stay pure and
/// trivially parallel-safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path of the file, relative to the target root.
    pub path: String,
    /// Full file content.
    pub content: String,
}

impl SourceFile {
    /// Creates a source file from a path and its content.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// What an analysis run operates on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisTarget {
    /// Root directory of the analyzed project.
    pub root: PathBuf,
    /// The files to analyze.
    pub files: Vec<SourceFile>,
    /// The input kinds present in this target.
    #[serde(default)]
    pub kinds: Vec<InputKind>,
}

impl AnalysisTarget {
    /// Creates a target rooted at `root` with the given files.
    pub fn new(root: impl Into<PathBuf>, files: Vec<SourceFile>) -> Self {
        Self {
            root: root.into(),
            files,
            kinds: vec![InputKind::Source],
        }
    }

    /// Declares the input kinds present in this target.
    pub fn with_kinds(mut self, kinds: Vec<InputKind>) -> Self {
        self.kinds = kinds;
        self
    }

    /// Whether the target contains the given input kind.
    pub fn has_kind(&self, kind: InputKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Declared capabilities of an analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    /// Input kinds the analyzer understands.
    pub input_kinds: Vec<InputKind>,
    /// Finding categories the analyzer may emit.
    pub categories: Vec<String>,
    /// Whether the analyzer may run concurrently with others.
    pub parallel_safe: bool,
}

impl Capabilities {
    /// Creates a parallel-safe capability set for the given input kinds
    /// and categories.
    pub fn new(input_kinds: Vec<InputKind>, categories: Vec<&str>) -> Self {
        Self {
            input_kinds,
            categories: categories.into_iter().map(String::from).collect(),
            parallel_safe: true,
        }
    }

    /// Marks the analyzer as unsafe to run concurrently with others.
    pub fn serial_only(mut self) -> Self {
        self.parallel_safe = false;
        self
    }

    /// Whether any of the analyzer's input kinds is present in `target`.
    pub fn matches(&self, target: &AnalysisTarget) -> bool {
        self.input_kinds.iter().any(|kind| target.has_kind(*kind))
    }
}
