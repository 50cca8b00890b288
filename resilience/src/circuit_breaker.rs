//! Consecutive-failure circuit breaker shared by every operation
//!
//! ```text
//!   Closed ──(failure_threshold consecutive failures)──> Open
//!   Open ──(recovery_timeout elapsed)──> HalfOpen (one trial attempt)
//!   HalfOpen ──(trial succeeds)──> Closed
//!   HalfOpen ──(trial fails)──> Open, recovery timer restarted
//! ```

use crate::config::CircuitBreakerConfig;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failing fast
    Open,
    /// One trial attempt in flight
    HalfOpen,
}

/// How a caller was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Normal,
    /// The single attempt allowed after the recovery timeout
    Trial,
}

/// Counters for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakerMetrics {
    /// Closed/HalfOpen → Open transitions
    pub trips: u64,
    /// HalfOpen → Closed transitions
    pub resets: u64,
    /// Calls refused while open
    pub rejected: u64,
    pub trials: u64,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_started: Option<Instant>,
    metrics: BreakerMetrics,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_started: None,
                metrics: BreakerMetrics::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn metrics(&self) -> BreakerMetrics {
        self.lock().metrics.clone()
    }

    /// Ask to run one attempt. `Err` carries the time left until a trial is
    /// allowed.
    pub fn try_acquire(&self) -> Result<Admission, Duration> {
        let recovery = self.config.recovery_timeout();
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= recovery {
                    transition(&mut inner, CircuitState::HalfOpen);
                    inner.trial_started = Some(now);
                    inner.metrics.trials += 1;
                    Ok(Admission::Trial)
                } else {
                    inner.metrics.rejected += 1;
                    Err(recovery - elapsed)
                }
            }
            CircuitState::HalfOpen => {
                // A trial whose caller went away never reports back; after a
                // full recovery window another caller may take its place.
                let started = inner.trial_started.unwrap_or(now);
                if now.saturating_duration_since(started) >= recovery {
                    inner.trial_started = Some(now);
                    inner.metrics.trials += 1;
                    Ok(Admission::Trial)
                } else {
                    inner.metrics.rejected += 1;
                    Err(recovery.saturating_sub(now.saturating_duration_since(started)))
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        if inner.state != CircuitState::Closed {
            inner.metrics.resets += 1;
            inner.opened_at = None;
            inner.trial_started = None;
            transition(&mut inner, CircuitState::Closed);
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        let trip = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            CircuitState::Open => false,
        };
        if trip {
            inner.metrics.trips += 1;
            inner.opened_at = Some(Instant::now());
            inner.trial_started = None;
            transition(&mut inner, CircuitState::Open);
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

fn transition(inner: &mut Inner, to: CircuitState) {
    let from = inner.state;
    if from == to {
        return;
    }
    inner.state = to;
    tracing::info!(
        from = ?from,
        to = ?to,
        consecutive_failures = inner.consecutive_failures,
        "circuit_breaker_state_change"
    );
}
