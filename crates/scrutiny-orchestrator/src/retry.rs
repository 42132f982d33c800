use crate::config::RetryPolicy;
use scrutiny_core::ScrutinyError;
use std::time::Duration;

/// Computes the backoff delay after a failed attempt.
///
/// `attempt` is 1-based (the attempt that just failed). The delay is
/// `base × 2^(attempt - 1)` capped at `backoff_max_ms`.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let delay = policy
        .backoff_base_ms
        .saturating_mul(2u64.saturating_pow(exponent));
    Duration::from_millis(delay.min(policy.backoff_max_ms))
}

/// Determines whether a failed attempt is worth retrying.
///
/// Analyzer errors, timeouts, and I/O failures are treated as transient.
/// Fatal analyzer errors, configuration problems, and open circuits fail
/// the attempt loop immediately.
pub fn is_recoverable(err: &ScrutinyError) -> bool {
    match err {
        ScrutinyError::Analyzer(_) | ScrutinyError::Timeout { .. } | ScrutinyError::Io(_) => true,
        ScrutinyError::Fatal(_)
        | ScrutinyError::CircuitOpen(_)
        | ScrutinyError::Config(_)
        | ScrutinyError::Registry(_)
        | ScrutinyError::DependencyCycle { .. }
        | ScrutinyError::Coordinator(_)
        | ScrutinyError::Json(_) => false,
    }
}
