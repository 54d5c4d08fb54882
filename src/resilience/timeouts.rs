//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race a protected call against its deadline
//! - Cancel whichever side loses the race
//!
//! # Design Decisions
//! - Uses Tokio's timer and `select!`
//! - A call that loses is dropped and never polled again, so a late result
//!   cannot reach the breaker
//! - Timeout errors are distinct from the call's own errors

use std::future::Future;
use std::time::Duration;

/// Why a raced call did not produce a value.
#[derive(Debug, PartialEq, Eq)]
pub enum CallError<E> {
    /// The call settled with its own error.
    Failed(E),
    /// The deadline elapsed first.
    TimedOut,
}

/// Run `call` with a deadline of `limit`.
///
/// If both sides are ready on the same poll the call wins.
pub async fn execute_with_timeout<Fut, T, E>(limit: Duration, call: Fut) -> Result<T, CallError<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    tokio::select! {
        biased;
        outcome = call => outcome.map_err(CallError::Failed),
        _ = tokio::time::sleep(limit) => Err(CallError::TimedOut),
    }
}
