//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers produce:
//!     → logging.rs (structured transition and rejection events)
//!     → metrics.rs (counters and a state gauge)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Whatever metrics recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics go through the `metrics` facade; without a recorder they are no-ops
//! - The breaker itself never performs I/O beyond these events

pub mod logging;
pub mod metrics;
