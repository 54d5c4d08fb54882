//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → BreakerConfig → BreakerOptions for each breaker
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields except a breaker's name have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{BreakerConfig, GuardConfig, LogFormat, ObservabilityConfig};
pub use validation::{validate_config, ValidationError};
