//! Per-dependency circuit breaker.
//!
//! ```text
//! CLOSED    -> OPEN       volume >= threshold && error% >= threshold (rolling window)
//! OPEN      -> HALF_OPEN  sleep window elapsed (checked lazily on access)
//! HALF_OPEN -> CLOSED     trial call succeeded (window reset)
//! HALF_OPEN -> OPEN       trial call failed or timed out (sleep window restarts)
//! ```
//!
//! Only one trial call is admitted while HALF_OPEN, and only its outcome
//! (recorded with [`CircuitBreaker::record_probe_outcome`]) decides the trial.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::rolling::{Outcome, RollingWindow, WindowTotals};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    /// Numeric encoding for gauges.
    pub fn as_gauge(self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

/// Answer to [`CircuitBreaker::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Denied,
    Allowed,
    /// Allowed as the single HALF_OPEN trial call.
    Probe,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed,
    Open { opened_at: Instant },
    HalfOpen { probe_in_flight: bool },
}

impl Phase {
    fn state(self) -> CircuitState {
        match self {
            Phase::Closed => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerHealth {
    pub state: CircuitState,
    pub window: WindowTotals,
    pub times_opened: u64,
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    window: RollingWindow,
    times_opened: u64,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        let window = RollingWindow::new(config.rolling_window, config.buckets);
        Self {
            name: name.to_string(),
            config,
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                window,
                times_opened: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.phase.state()
    }

    /// Whether a new call may be attempted. In HALF_OPEN a `true` answer hands
    /// the caller the single trial slot, which is released by recording an
    /// outcome or by [`CircuitBreaker::release_probe`].
    pub fn allow_request(&self) -> bool {
        self.admit() != Admission::Denied
    }

    /// Like [`CircuitBreaker::allow_request`], but tells a trial call apart
    /// from a regular one.
    pub fn admit(&self) -> Admission {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        match &mut inner.phase {
            Phase::Closed => Admission::Allowed,
            Phase::Open { .. } => Admission::Denied,
            Phase::HalfOpen { probe_in_flight } => {
                if *probe_in_flight {
                    Admission::Denied
                } else {
                    *probe_in_flight = true;
                    Admission::Probe
                }
            }
        }
    }

    /// Records the outcome of a regular call. While HALF_OPEN this only feeds
    /// the window; late results of calls admitted before the circuit opened
    /// never decide the trial.
    pub fn record_outcome(&self, outcome: Outcome) {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.window.record(now, outcome);

        if let Phase::Closed = inner.phase {
            let totals = inner.window.totals(now);
            if self.should_trip(&totals) {
                tracing::warn!(
                    dependency=%self.name,
                    total=totals.total(),
                    error_percent=totals.error_percent(),
                    "circuit opened"
                );
                self.open(&mut inner, now);
            }
        }
    }

    /// Records the outcome of the call admitted as [`Admission::Probe`] and
    /// settles the HALF_OPEN trial with it.
    pub fn record_probe_outcome(&self, outcome: Outcome) {
        let now = Instant::now();
        let mut inner = self.lock();
        if !matches!(inner.phase, Phase::HalfOpen { .. }) {
            drop(inner);
            self.record_outcome(outcome);
            return;
        }

        inner.window.record(now, outcome);
        if outcome == Outcome::Success {
            tracing::info!(dependency=%self.name, "trial call succeeded, circuit closed");
            inner.phase = Phase::Closed;
            inner.window.reset();
        } else {
            tracing::warn!(dependency=%self.name, ?outcome, "trial call failed, circuit re-opened");
            self.open(&mut inner, now);
        }
    }

    /// Gives back an unused trial slot (the trial call was abandoned before it
    /// produced an outcome).
    pub fn release_probe(&self) {
        let mut inner = self.lock();
        if let Phase::HalfOpen { probe_in_flight } = &mut inner.phase {
            *probe_in_flight = false;
        }
    }

    pub fn health(&self) -> BreakerHealth {
        let now = Instant::now();
        let mut inner = self.lock();
        self.refresh(&mut inner, now);
        BreakerHealth {
            state: inner.phase.state(),
            window: inner.window.totals(now),
            times_opened: inner.times_opened,
        }
    }

    fn should_trip(&self, totals: &WindowTotals) -> bool {
        totals.total() >= self.config.request_volume_threshold
            && totals.errors() * 100
                >= u64::from(self.config.error_threshold_percent) * totals.total()
    }

    fn open(&self, inner: &mut Inner, now: Instant) {
        inner.phase = Phase::Open { opened_at: now };
        inner.times_opened += 1;
    }

    fn refresh(&self, inner: &mut Inner, now: Instant) {
        if let Phase::Open { opened_at } = inner.phase {
            if now.duration_since(opened_at) >= self.config.sleep_window {
                tracing::info!(dependency=%self.name, "sleep window elapsed, circuit half-open");
                inner.phase = Phase::HalfOpen {
                    probe_in_flight: false,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("org-svc", CircuitBreakerConfig::default())
    }

    fn record_n(b: &CircuitBreaker, outcome: Outcome, n: usize) {
        for _ in 0..n {
            b.record_outcome(outcome);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stays_closed_below_volume_threshold() {
        let b = breaker();
        record_n(&b, Outcome::Failure, 9);
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(b.allow_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_error_threshold() {
        let b = breaker();
        record_n(&b, Outcome::Success, 3);
        record_n(&b, Outcome::Failure, 6);
        // 6/9 errors, below volume
        assert_eq!(b.state(), CircuitState::Closed);
        b.record_outcome(Outcome::Timeout);
        // 7/10 = 70%
        assert_eq!(b.state(), CircuitState::Closed);
        b.record_outcome(Outcome::Failure);
        // 8/11 = 72.7%
        assert_eq!(b.state(), CircuitState::Closed);
        record_n(&b, Outcome::Failure, 1);
        // 9/12 = 75%
        assert_eq!(b.state(), CircuitState::Open);
        assert!(!b.allow_request());
        assert_eq!(b.health().times_opened, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_failures_do_not_count() {
        let b = breaker();
        record_n(&b, Outcome::Failure, 9);
        tokio::time::advance(Duration::from_secs(16)).await;
        b.record_outcome(Outcome::Failure);
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.health().window.total(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_probe_then_close() {
        let b = breaker();
        record_n(&b, Outcome::Failure, 10);
        assert_eq!(b.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(6_999)).await;
        assert!(!b.allow_request());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert!(b.allow_request());
        assert!(!b.allow_request());

        b.record_probe_outcome(Outcome::Success);
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.health().window.total(), 0);
        assert!(b.allow_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens_and_restarts_sleep() {
        let b = breaker();
        record_n(&b, Outcome::Failure, 10);
        tokio::time::advance(Duration::from_secs(7)).await;
        assert!(b.allow_request());

        b.record_probe_outcome(Outcome::Timeout);
        assert_eq!(b.state(), CircuitState::Open);
        assert_eq!(b.health().times_opened, 2);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!b.allow_request());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(b.allow_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_probe_can_be_retaken() {
        let b = breaker();
        record_n(&b, Outcome::Failure, 10);
        tokio::time::advance(Duration::from_secs(7)).await;

        assert_eq!(b.admit(), Admission::Probe);
        assert_eq!(b.admit(), Admission::Denied);
        b.release_probe();
        assert!(b.allow_request());
        assert_eq!(b.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_regular_outcome_does_not_decide_trial() {
        let b = breaker();
        record_n(&b, Outcome::Failure, 10);
        tokio::time::advance(Duration::from_secs(7)).await;
        assert_eq!(b.admit(), Admission::Probe);

        b.record_outcome(Outcome::Success);
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert_eq!(b.admit(), Admission::Denied);

        b.record_outcome(Outcome::Failure);
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert_eq!(b.health().times_opened, 1);

        b.record_probe_outcome(Outcome::Success);
        assert_eq!(b.state(), CircuitState::Closed);
    }
}
