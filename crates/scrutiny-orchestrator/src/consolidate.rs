use crate::types::AnalyzerReport;
use scrutiny_core::Finding;
use std::collections::HashMap;

/// The output of consolidation: deduplicated findings plus counts.
#[derive(Debug, Clone)]
pub struct Consolidation {
    /// Deduplicated findings, severity-ordered (critical first), then by
    /// file path and line for stable output.
    pub findings: Vec<Finding>,
    /// Finding count before deduplication.
    pub raw_count: usize,
    /// Findings removed as duplicates.
    pub duplicates_removed: usize,
}

/// Consolidates the findings of all reports, in report order.
pub fn consolidate(reports: &[AnalyzerReport]) -> Consolidation {
    let flattened: Vec<Finding> = reports
        .iter()
        .flat_map(|report| report.findings.iter().cloned())
        .collect();
    consolidate_findings(flattened)
}

/// Deduplicates and orders a flat finding list.
///
/// Findings sharing a [`Finding::dedup_key`] are the same logical issue
/// reported by multiple analyzers: the first occurrence is kept unless a
/// later one outranks it in severity, and metadata maps are merged either
/// way (later keys win on conflict) so provenance survives. The result is
/// sorted critical-first, then by file and line, so output is
/// deterministic regardless of execution interleaving.
pub fn consolidate_findings(findings: Vec<Finding>) -> Consolidation {
    let raw_count = findings.len();

    let mut kept: Vec<Finding> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for finding in findings {
        let key = finding.dedup_key();
        match index_by_key.get(&key) {
            None => {
                index_by_key.insert(key, kept.len());
                kept.push(finding);
            }
            Some(&at) => {
                let existing = &mut kept[at];
                if finding.severity > existing.severity {
                    // The higher-severity variant wins, carrying forward
                    // the metadata already accumulated under this key.
                    let mut merged = std::mem::take(&mut existing.metadata);
                    merged.extend(finding.metadata.clone());
                    let mut replacement = finding;
                    replacement.metadata = merged;
                    *existing = replacement;
                } else {
                    existing.metadata.extend(finding.metadata);
                }
            }
        }
    }

    kept.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.file.cmp(&b.file))
            .then_with(|| a.line.unwrap_or(0).cmp(&b.line.unwrap_or(0)))
    });

    let duplicates_removed = raw_count - kept.len();
    Consolidation {
        findings: kept,
        raw_count,
        duplicates_removed,
    }
}
