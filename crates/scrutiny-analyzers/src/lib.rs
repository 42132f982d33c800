//! Bundled example analyzers for the Scrutiny engine.
//!
//! These units implement the [`scrutiny_core::Analyzer`] contract with
//! deliberately mechanical regex heuristics. They exist so the
//! orchestration pipeline can be exercised end to end; the engine itself
//! never depends on their internals.
//!
//! # Analyzers
//!
//! - [`HardcodedSecretAnalyzer`] — credentials embedded in source.
//! - [`DangerousCallAnalyzer`] — calls that execute arbitrary code or
//!   commands.
//! - [`TestGapAnalyzer`] — source files with no accompanying tests.

/// Detection of dynamic code execution and shell-out calls.
pub mod dangerous;
/// Detection of credentials embedded in source.
pub mod secrets;
/// Heuristic detection of untested source files.
pub mod test_gap;

pub use dangerous::DangerousCallAnalyzer;
pub use secrets::HardcodedSecretAnalyzer;
pub use test_gap::TestGapAnalyzer;
