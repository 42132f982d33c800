use scrutiny_core::{ScrutinyError, ScrutinyResult};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Attempts pass through; failures are counted.
    Closed,
    /// Attempts fail immediately until the cool-down elapses.
    Open,
    /// One probe attempt is allowed; success closes, failure re-opens.
    HalfOpen,
}

/// A three-state circuit breaker for one operation class.
#[derive(Debug)]
struct CircuitBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            threshold,
            cooldown,
        }
    }

    /// Whether an attempt may proceed. Transitions open breakers to
    /// half-open once the cool-down has elapsed.
    fn try_acquire(&mut self) -> bool {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let cooled = self
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.cooldown);
                if cooled {
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&mut self) {
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        match self.state {
            // A failed probe re-opens immediately.
            BreakerState::HalfOpen => {
                self.state = BreakerState::Open;
                self.opened_at = Some(Instant::now());
            }
            BreakerState::Closed if self.consecutive_failures >= self.threshold => {
                self.state = BreakerState::Open;
                self.opened_at = Some(Instant::now());
            }
            _ => {}
        }
    }
}

/// Circuit breakers keyed by operation class.
///
/// Owned by the coordinator (or injected into it) rather than living in
/// ambient global state, so tests can isolate themselves with [`reset`].
///
/// [`reset`]: BreakerRegistry::reset
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
    threshold: u32,
    cooldown: Duration,
}

impl BreakerRegistry {
    /// Creates a registry whose breakers open after `threshold`
    /// consecutive failures and cool down for `cooldown`.
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            threshold,
            cooldown,
        }
    }

    /// Checks whether an attempt for `class` may proceed.
    ///
    /// Returns [`ScrutinyError::CircuitOpen`] without delay when the
    /// breaker is open and still cooling down.
    pub async fn acquire(&self, class: &str) -> ScrutinyResult<()> {
        let mut breakers = self.breakers.lock().await;
        let breaker = breakers
            .entry(class.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.threshold, self.cooldown));
        if breaker.try_acquire() {
            if breaker.state == BreakerState::HalfOpen {
                info!(class, "circuit half-open, allowing probe");
            }
            Ok(())
        } else {
            Err(ScrutinyError::CircuitOpen(class.to_string()))
        }
    }

    /// Records a successful attempt, closing the breaker.
    pub async fn record_success(&self, class: &str) {
        let mut breakers = self.breakers.lock().await;
        if let Some(breaker) = breakers.get_mut(class) {
            breaker.record_success();
        }
    }

    /// Records a failed attempt, opening the breaker at the threshold.
    pub async fn record_failure(&self, class: &str) {
        let mut breakers = self.breakers.lock().await;
        let breaker = breakers
            .entry(class.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.threshold, self.cooldown));
        let before = breaker.state;
        breaker.record_failure();
        if before != BreakerState::Open && breaker.state == BreakerState::Open {
            warn!(
                class,
                failures = breaker.consecutive_failures,
                "circuit opened"
            );
        }
    }

    /// Current state of the breaker for `class`, if one exists.
    pub async fn state(&self, class: &str) -> Option<BreakerState> {
        let breakers = self.breakers.lock().await;
        breakers.get(class).map(|b| b.state)
    }

    /// Clears all breaker state. Intended for test isolation and
    /// operator-driven recovery.
    pub async fn reset(&self) {
        self.breakers.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(threshold: u32, cooldown_ms: u64) -> BreakerRegistry {
        BreakerRegistry::new(threshold, Duration::from_millis(cooldown_ms))
    }

    #[tokio::test]
    async fn closed_until_threshold() {
        let breakers = registry(5, 60_000);
        for _ in 0..4 {
            breakers.acquire("unit").await.unwrap();
            breakers.record_failure("unit").await;
        }
        assert_eq!(breakers.state("unit").await, Some(BreakerState::Closed));
        assert!(breakers.acquire("unit").await.is_ok());
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let breakers = registry(5, 60_000);
        for _ in 0..5 {
            breakers.record_failure("unit").await;
        }
        assert_eq!(breakers.state("unit").await, Some(BreakerState::Open));
        let err = breakers.acquire("unit").await.unwrap_err();
        assert!(matches!(err, ScrutinyError::CircuitOpen(class) if class == "unit"));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breakers = registry(3, 60_000);
        breakers.record_failure("unit").await;
        breakers.record_failure("unit").await;
        breakers.record_success("unit").await;
        breakers.record_failure("unit").await;
        breakers.record_failure("unit").await;
        assert_eq!(breakers.state("unit").await, Some(BreakerState::Closed));
    }

    #[tokio::test]
    async fn half_open_after_cooldown_then_closes_on_probe_success() {
        let breakers = registry(1, 10);
        breakers.record_failure("unit").await;
        assert_eq!(breakers.state("unit").await, Some(BreakerState::Open));

        tokio::time::sleep(Duration::from_millis(20)).await;
        breakers.acquire("unit").await.unwrap();
        assert_eq!(breakers.state("unit").await, Some(BreakerState::HalfOpen));

        breakers.record_success("unit").await;
        assert_eq!(breakers.state("unit").await, Some(BreakerState::Closed));
    }

    #[tokio::test]
    async fn failed_probe_reopens() {
        let breakers = registry(1, 10);
        breakers.record_failure("unit").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        breakers.acquire("unit").await.unwrap();
        breakers.record_failure("unit").await;
        assert_eq!(breakers.state("unit").await, Some(BreakerState::Open));
        assert!(breakers.acquire("unit").await.is_err());
    }

    #[tokio::test]
    async fn classes_are_independent() {
        let breakers = registry(1, 60_000);
        breakers.record_failure("flaky").await;
        assert!(breakers.acquire("flaky").await.is_err());
        assert!(breakers.acquire("steady").await.is_ok());
    }

    #[tokio::test]
    async fn reset_clears_all_state() {
        let breakers = registry(1, 60_000);
        breakers.record_failure("unit").await;
        assert!(breakers.acquire("unit").await.is_err());
        breakers.reset().await;
        assert!(breakers.acquire("unit").await.is_ok());
        assert_eq!(breakers.state("unit").await, Some(BreakerState::Closed));
    }
}
