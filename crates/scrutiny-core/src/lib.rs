//! Core types and error definitions for the Scrutiny analysis engine.
//!
//! This crate provides the foundational types shared across all Scrutiny
//! crates, including error handling, finding representations, and the
//! analyzer contract.
//!
//! # Main types
//!
//! - [`ScrutinyError`] — Unified error enum for all Scrutiny subsystems.
//! - [`ScrutinyResult`] — Convenience alias for `Result<T, ScrutinyError>`.
//! - [`Severity`] — Ordered finding severity (info through critical).
//! - [`Finding`] — A single detected issue with location and metadata.
//! - [`AnalysisTarget`] — The material an analysis run operates on.
//! - [`Analyzer`] — The contract every analysis unit implements.
//! - [`HealthStatus`] — Self-reported health of an analysis unit.

/// The analyzer contract and its supporting context types.
pub mod analyzer;
/// Finding and severity representations.
pub mod finding;
/// Analysis targets, input kinds, and capability descriptors.
pub mod target;

pub use analyzer::{AnalysisContext, Analyzer, HealthState, HealthStatus};
pub use finding::{Finding, Severity};
pub use target::{AnalysisTarget, Capabilities, InputKind, SourceFile};

// --- Error types ---

/// Top-level error type for the Scrutiny engine.
///
/// Each variant corresponds to a subsystem or failure class that can
/// produce errors.
#[derive(Debug, thiserror::Error)]
pub enum ScrutinyError {
    /// An error from the analyzer registry (duplicate name, unknown unit).
    #[error("Registry error: {0}")]
    Registry(String),

    /// A dependency cycle detected during execution ordering.
    ///
    /// This is fatal: no analyzer executes once a cycle is found.
    #[error("Dependency cycle involving analyzer '{analyzer}'")]
    DependencyCycle {
        /// A member of the detected cycle.
        analyzer: String,
    },

    /// A recoverable error raised by an analyzer during execution.
    #[error("Analyzer error: {0}")]
    Analyzer(String),

    /// A non-recoverable analyzer failure. Never retried.
    #[error("Fatal analyzer error: {0}")]
    Fatal(String),

    /// An analyzer exceeded its execution timeout.
    #[error("Analyzer '{analyzer}' timed out after {ms}ms")]
    Timeout {
        /// The analyzer that timed out.
        analyzer: String,
        /// The timeout that was exceeded, in milliseconds.
        ms: u64,
    },

    /// An operation was rejected because its circuit breaker is open.
    #[error("Circuit open for '{0}'")]
    CircuitOpen(String),

    /// A run-level coordination error (fail-fast abort, empty selection).
    #[error("Coordinator error: {0}")]
    Coordinator(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`ScrutinyError`].
pub type ScrutinyResult<T> = Result<T, ScrutinyError>;
