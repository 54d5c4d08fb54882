//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! caller → CircuitBreaker::fire(args)
//!     → circuit_breaker.rs (admission: closed / open / half-open trial)
//!     → timeouts.rs (race the wrapped call against its deadline)
//!     → circuit_breaker.rs (record outcome, maybe transition)
//!     → result, error, or fallback
//!
//! registry.rs collects breakers for stats and operator resets.
//! ```
//!
//! # Design Decisions
//! - Every protected call has a deadline
//! - Retries are layered by the caller on top of fire(), never inside it
//! - Circuit breaker prevents cascading failures

pub mod circuit_breaker;
pub mod registry;
pub mod timeouts;
pub mod types;

pub use circuit_breaker::CircuitBreaker;
pub use registry::{BreakerSet, Inspect};
pub use types::{BreakerError, BreakerOptions, BreakerStats, CircuitState};
