//! Breaker states, options, statistics and error definitions.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name used when the options do not carry one.
pub const DEFAULT_BREAKER_NAME: &str = "circuit-breaker";

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls pass through and are measured.
    Closed,
    /// Calls fail fast (or use the fallback) until the reset deadline.
    Open,
    /// A single trial call decides whether to close or reopen.
    HalfOpen,
}

impl CircuitState {
    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }

    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable breaker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerOptions {
    /// Deadline for a single wrapped call.
    pub timeout: Duration,
    /// Failure rate (0–100) over the window that trips the circuit.
    pub error_threshold_percentage: f64,
    /// How long the circuit stays open before a trial is allowed.
    pub reset_timeout: Duration,
    /// Minimum requests in the window before the error rate is evaluated.
    pub volume_threshold: u64,
    /// Diagnostic name used in logs, metrics and errors.
    pub name: Option<String>,
}

impl BreakerOptions {
    pub fn new(timeout: Duration, error_threshold_percentage: f64, reset_timeout: Duration) -> Self {
        Self {
            timeout,
            error_threshold_percentage,
            reset_timeout,
            volume_threshold: 0,
            name: None,
        }
    }

    pub fn with_volume_threshold(mut self, volume_threshold: u64) -> Self {
        self.volume_threshold = volume_threshold;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The configured name, or [`DEFAULT_BREAKER_NAME`].
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_BREAKER_NAME)
    }
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            error_threshold_percentage: 50.0,
            reset_timeout: Duration::from_secs(30),
            volume_threshold: 0,
            name: None,
        }
    }
}

/// Point-in-time view of a breaker, suitable for health endpoints and logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u64,
    pub success_count: u64,
    pub request_count: u64,
    /// Calls refused while open or while a trial was in flight.
    pub rejected_count: u64,
    /// Failure rate of the current window, e.g. `"50.00%"`.
    pub error_rate: String,
    /// Epoch milliseconds at which the circuit may leave OPEN. `None` unless open.
    pub next_attempt: Option<u64>,
    /// Milliseconds left until `next_attempt`. `None` unless open.
    pub retry_after_ms: Option<u64>,
}

/// Errors returned by [`CircuitBreaker::fire`](super::CircuitBreaker::fire).
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the wrapped function was not called.
    #[error("circuit `{name}` is open")]
    CircuitOpen { name: String },

    /// The wrapped function did not settle within the deadline.
    #[error("circuit `{name}` call timed out after {timeout_ms} ms")]
    Timeout { name: String, timeout_ms: u64 },

    /// The wrapped function failed.
    #[error("{0}")]
    Inner(#[source] E),

    /// The fallback itself failed.
    #[error("fallback failed: {0}")]
    Fallback(#[source] E),
}

impl<E> BreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, BreakerError::CircuitOpen { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }

    /// The wrapped function's or fallback's own error, if that is what failed.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Inner(e) | BreakerError::Fallback(e) => Some(e),
            _ => None,
        }
    }
}
