use crate::registry::AnalyzerRegistry;
use futures_util::future::join_all;
use scrutiny_core::{HealthState, HealthStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Health of one analyzer as observed by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerHealth {
    /// The analyzer that was probed.
    pub analyzer: String,
    /// The observed status (self-reported, or synthesized on probe failure).
    pub status: HealthStatus,
    /// Whether the probe itself failed to complete (error or timeout).
    pub probe_failed: bool,
}

/// Aggregate health over all registered analyzers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// The aggregate classification.
    pub status: HealthState,
    /// Per-analyzer detail, sorted by analyzer name.
    pub analyzers: Vec<AnalyzerHealth>,
}

/// Polls analyzer health probes and aggregates one status.
///
/// Probes run under the same timeout discipline as analysis but are
/// never retried. The aggregator reads the registry only, so it is safe
/// to call while runs are in flight.
#[derive(Debug)]
pub struct HealthAggregator {
    timeout: Duration,
}

impl HealthAggregator {
    /// Creates an aggregator with the given per-probe timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Probes every registered analyzer and aggregates the outcome.
    ///
    /// Aggregation: `Healthy` iff every unit reports healthy;
    /// `Unhealthy` iff any probe fails to complete; `Degraded`
    /// otherwise (some units self-report problems but all probes
    /// completed).
    pub async fn check(&self, registry: &AnalyzerRegistry) -> HealthReport {
        let probes = registry.all().into_iter().map(|analyzer| async move {
            let name = analyzer.name().to_string();
            match timeout(self.timeout, analyzer.health()).await {
                Ok(Ok(status)) => AnalyzerHealth {
                    analyzer: name,
                    status,
                    probe_failed: false,
                },
                Ok(Err(err)) => {
                    warn!(analyzer = %name, error = %err, "health probe failed");
                    AnalyzerHealth {
                        analyzer: name,
                        status: HealthStatus::unhealthy(format!("health probe failed: {err}")),
                        probe_failed: true,
                    }
                }
                Err(_) => {
                    warn!(analyzer = %name, "health probe timed out");
                    AnalyzerHealth {
                        analyzer: name,
                        status: HealthStatus::unhealthy(format!(
                            "health probe timed out after {}ms",
                            self.timeout.as_millis()
                        )),
                        probe_failed: true,
                    }
                }
            }
        });

        let mut analyzers: Vec<AnalyzerHealth> = join_all(probes).await;
        analyzers.sort_by(|a, b| a.analyzer.cmp(&b.analyzer));

        let status = aggregate(&analyzers);
        HealthReport { status, analyzers }
    }
}

fn aggregate(analyzers: &[AnalyzerHealth]) -> HealthState {
    if analyzers.iter().any(|a| a.probe_failed) {
        HealthState::Unhealthy
    } else if analyzers
        .iter()
        .all(|a| a.status.state == HealthState::Healthy)
    {
        HealthState::Healthy
    } else {
        HealthState::Degraded
    }
}
