//! Circuit breaker (component C), one instance per guarded dependency.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use forgecast_domain::PipelineError;
use forgecast_telemetry::Metrics;

/// Observable state of a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through normally.
    Closed,
    /// Calls fail fast without reaching the dependency.
    Open,
    /// A single probe call is admitted to test recovery.
    HalfOpen,
}

/// Default consecutive-failure threshold before tripping to `Open`.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
/// Default rolling window over which failures are counted.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Default duration spent `Open` before a probe is admitted.
pub const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(60);

struct Inner {
    state: CircuitState,
    failure_count: u32,
    window_start: Instant,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Closed/Open/Half-Open breaker guarding a single named dependency.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    window: Duration,
    open_duration: Duration,
    inner: Mutex<Inner>,
    metrics: Option<Metrics>,
}

impl CircuitBreaker {
    /// Construct a breaker with explicit thresholds.
    #[must_use]
    pub fn new(name: impl Into<String>, failure_threshold: u32, window: Duration, open_duration: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            window,
            open_duration,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                window_start: Instant::now(),
                opened_at: None,
                probe_in_flight: false,
            }),
            metrics: None,
        }
    }

    /// Construct a breaker using the spec-default thresholds.
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(
            name,
            DEFAULT_FAILURE_THRESHOLD,
            DEFAULT_WINDOW,
            DEFAULT_OPEN_DURATION,
        )
    }

    /// Attach a metrics sink used to record trips into `Open`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current observable state, without mutating it.
    #[must_use]
    pub fn status(&self) -> CircuitState {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).state
    }

    /// Check whether a call may proceed; transitions `Open` -> `HalfOpen`
    /// once `open_duration` has elapsed, admitting exactly one probe.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CircuitOpen`] if the call must fail fast.
    pub fn before_call(&self) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Instant::now();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                if now.saturating_duration_since(opened_at) >= self.open_duration {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    Ok(())
                } else {
                    Err(self.open_error())
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(self.open_error())
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful call; closes the breaker if it was half-open.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    /// Record a failed call; trips the breaker to `Open` once the threshold
    /// is reached within the configured window, or immediately on a failed probe.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Instant::now();
        match inner.state {
            CircuitState::Closed => {
                if now.saturating_duration_since(inner.window_start) > self.window {
                    inner.failure_count = 0;
                    inner.window_start = now;
                }
                inner.failure_count += 1;
                if inner.failure_count >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                    drop(inner);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_circuit_trip(&self.name);
                    }
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                inner.probe_in_flight = false;
                inner.failure_count = self.failure_threshold;
                drop(inner);
                if let Some(metrics) = &self.metrics {
                    metrics.record_circuit_trip(&self.name);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn open_error(&self) -> PipelineError {
        PipelineError::CircuitOpen {
            dependency: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new("flaresolverr", 3, StdDuration::from_secs(60), StdDuration::from_secs(60));
        for _ in 0..2 {
            breaker.before_call().unwrap();
            breaker.record_failure();
        }
        assert_eq!(breaker.status(), CircuitState::Closed);

        breaker.before_call().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.status(), CircuitState::Open);
        assert!(breaker.before_call().is_err());
    }

    #[test]
    fn half_open_probe_recovers_on_success() {
        let breaker = CircuitBreaker::new("flaresolverr", 1, StdDuration::from_secs(60), StdDuration::from_millis(10));
        breaker.before_call().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.status(), CircuitState::Open);

        std::thread::sleep(StdDuration::from_millis(20));
        breaker.before_call().unwrap();
        assert_eq!(breaker.status(), CircuitState::HalfOpen);

        // A second caller arriving while the probe is in flight is denied.
        assert!(breaker.before_call().is_err());

        breaker.record_success();
        assert_eq!(breaker.status(), CircuitState::Closed);
        breaker.before_call().unwrap();
    }

    #[test]
    fn half_open_probe_failure_reopens_and_restarts_timer() {
        let breaker = CircuitBreaker::new("flaresolverr", 1, StdDuration::from_secs(60), StdDuration::from_millis(10));
        breaker.before_call().unwrap();
        breaker.record_failure();
        std::thread::sleep(StdDuration::from_millis(20));
        breaker.before_call().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.status(), CircuitState::Open);
        assert!(breaker.before_call().is_err());
    }
}
