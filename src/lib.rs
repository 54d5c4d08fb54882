//! Circuit breaker for protecting calls to slow or failing dependencies.

pub mod config;
pub mod observability;
pub mod resilience;

pub use config::schema::GuardConfig;
pub use resilience::{
    BreakerError, BreakerOptions, BreakerSet, BreakerStats, CircuitBreaker, CircuitState, Inspect,
};
