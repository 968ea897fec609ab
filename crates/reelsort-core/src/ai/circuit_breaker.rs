//! Circuit breaker guarding the AI matcher.
//!
//! Failures are counted inside a sliding window that starts at the first
//! failure. Reaching the threshold opens the circuit; it closes itself lazily
//! the first time it is queried after the cooldown has elapsed.
//!
//! Every time-dependent method has an `_at` variant taking an explicit
//! [`Instant`] so the state machine can be driven without sleeping.

use crate::config::CircuitBreakerSettings;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow through.
    Closed,
    /// Calls are rejected until the cooldown has elapsed.
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures inside one window that open the circuit.
    pub failure_threshold: u32,
    /// Length of the failure-counting window.
    pub failure_window: Duration,
    /// Time the circuit stays open.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerSettings::default().into()
    }
}

impl From<CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            failure_window: Duration::from_secs(settings.failure_window_seconds),
            cooldown: Duration::from_secs(settings.cooldown_seconds),
        }
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    failures: u32,
    first_failure: Option<Instant>,
    opened_at: Option<Instant>,
}

/// Breaker owned by one [`crate::ai::AiHelper`].
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    domain: String,
}

impl CircuitBreaker {
    pub fn new(domain: impl Into<String>) -> Self {
        Self::with_config(domain, CircuitBreakerConfig::default())
    }

    pub fn with_config(domain: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState::default()),
            domain: domain.into(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        // The state is a handful of plain fields; a panic mid-update cannot
        // leave it unusable, so a poisoned lock is recovered.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True while calls should be rejected.
    pub fn is_open(&self) -> bool {
        self.is_open_at(Instant::now())
    }

    /// [`is_open`](Self::is_open) against an explicit clock.
    ///
    /// Closes the circuit and clears the failure count once the cooldown
    /// has elapsed.
    pub fn is_open_at(&self, now: Instant) -> bool {
        let mut state = self.lock();
        match state.opened_at {
            Some(opened) if now.saturating_duration_since(opened) >= self.config.cooldown => {
                state.opened_at = None;
                state.failures = 0;
                state.first_failure = None;
                info!("Circuit breaker for {} closed after cooldown", self.domain);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn state(&self) -> CircuitState {
        if self.is_open() {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    /// Count one failure at `now`.
    pub fn record_failure_at(&self, now: Instant) {
        let mut state = self.lock();

        if state.failures > 0 {
            if let Some(first) = state.first_failure {
                if now.saturating_duration_since(first) > self.config.failure_window {
                    debug!("Failure window for {} expired, resetting count", self.domain);
                    state.failures = 0;
                }
            }
        }
        if state.failures == 0 {
            state.first_failure = Some(now);
        }
        state.failures += 1;

        if state.failures >= self.config.failure_threshold && state.opened_at.is_none() {
            state.opened_at = Some(now);
            warn!(
                "Circuit breaker for {} opened after {} failures",
                self.domain, state.failures
            );
        }
    }

    /// Clear the failure count after a successful call.
    pub fn reset_failures(&self) {
        let mut state = self.lock();
        state.failures = 0;
        state.first_failure = None;
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }
}
