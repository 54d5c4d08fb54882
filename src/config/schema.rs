//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::types::BreakerOptions;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// One entry per protected dependency.
    pub breakers: Vec<BreakerConfig>,
}

impl GuardConfig {
    /// Look up a breaker definition by name.
    pub fn breaker(&self, name: &str) -> Option<&BreakerConfig> {
        self.breakers.iter().find(|b| b.name == name)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Circuit breaker definition.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BreakerConfig {
    /// Unique breaker identifier for logs and metrics.
    pub name: String,

    /// Deadline for a single protected call in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Failure rate (0–100) that trips the circuit.
    #[serde(default = "default_error_threshold")]
    pub error_threshold_percentage: f64,

    /// Time the circuit stays open before a trial call, in milliseconds.
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,

    /// Minimum requests before the error rate is evaluated.
    #[serde(default)]
    pub volume_threshold: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_error_threshold() -> f64 {
    50.0
}

fn default_reset_timeout_ms() -> u64 {
    30_000
}

impl BreakerConfig {
    /// A definition with default thresholds.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeout_ms: default_timeout_ms(),
            error_threshold_percentage: default_error_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
            volume_threshold: 0,
        }
    }
}

impl From<&BreakerConfig> for BreakerOptions {
    fn from(config: &BreakerConfig) -> Self {
        BreakerOptions::new(
            Duration::from_millis(config.timeout_ms),
            config.error_threshold_percentage,
            Duration::from_millis(config.reset_timeout_ms),
        )
        .with_volume_threshold(config.volume_threshold)
        .with_name(config.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_options() {
        let options = BreakerOptions::from(&BreakerConfig::named("billing"));
        let defaults = BreakerOptions::default();
        assert_eq!(options.timeout, defaults.timeout);
        assert_eq!(options.reset_timeout, defaults.reset_timeout);
        assert_eq!(options.error_threshold_percentage, defaults.error_threshold_percentage);
        assert_eq!(options.name(), "billing");
    }

    #[test]
    fn test_conversion_carries_values() {
        let config = BreakerConfig {
            name: "search".into(),
            timeout_ms: 50,
            error_threshold_percentage: 25.0,
            reset_timeout_ms: 200,
            volume_threshold: 4,
        };
        let options = BreakerOptions::from(&config);
        assert_eq!(options.timeout, Duration::from_millis(50));
        assert_eq!(options.reset_timeout, Duration::from_millis(200));
        assert_eq!(options.volume_threshold, 4);
        assert_eq!(options.error_threshold_percentage, 25.0);
    }
}
