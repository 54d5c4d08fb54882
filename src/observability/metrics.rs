//! Metrics collection.
//!
//! # Metrics
//! - `circuit_breaker_transitions_total` (counter): state changes by breaker, target state
//! - `circuit_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `circuit_breaker_calls_total` (counter): wrapped calls by breaker, outcome
//! - `circuit_breaker_rejections_total` (counter): calls refused while open
//! - `circuit_breaker_fallbacks_total` (counter): fallback invocations
//!
//! # Design Decisions
//! - Recording only; exposition belongs to the host application
//! - Labels for breaker name, state and outcome

use metrics::{counter, gauge};

use crate::resilience::types::CircuitState;

/// Record a state transition.
pub fn record_transition(breaker: &str, to: CircuitState) {
    counter!(
        "circuit_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "state" => to.as_str()
    )
    .increment(1);
    gauge!("circuit_breaker_state", "breaker" => breaker.to_string()).set(to.as_gauge());
}

/// Record a completed wrapped call (`success`, `failure`, `timeout`, `ignored`).
pub fn record_call(breaker: &str, outcome: &'static str) {
    counter!(
        "circuit_breaker_calls_total",
        "breaker" => breaker.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a call refused without invoking the wrapped function.
pub fn record_rejection(breaker: &str) {
    counter!("circuit_breaker_rejections_total", "breaker" => breaker.to_string()).increment(1);
}

/// Record a fallback invocation.
pub fn record_fallback(breaker: &str) {
    counter!("circuit_breaker_fallbacks_total", "breaker" => breaker.to_string()).increment(1);
}
