//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, threshold within 0–100)
//! - Detect duplicate breaker names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::GuardConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("breaker #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("breaker `{0}` is defined more than once")]
    DuplicateName(String),

    #[error("breaker `{name}`: {field} must be greater than zero")]
    ZeroDuration { name: String, field: &'static str },

    #[error("breaker `{name}`: error_threshold_percentage {value} is outside 0-100")]
    ThresholdOutOfRange { name: String, value: f64 },

    #[error("unknown log level `{0}`")]
    UnknownLogLevel(String),
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }

    let mut seen = HashSet::new();
    for (index, breaker) in config.breakers.iter().enumerate() {
        if breaker.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName { index });
        } else if !seen.insert(breaker.name.as_str()) {
            errors.push(ValidationError::DuplicateName(breaker.name.clone()));
        }

        if breaker.timeout_ms == 0 {
            errors.push(ValidationError::ZeroDuration {
                name: breaker.name.clone(),
                field: "timeout_ms",
            });
        }
        if breaker.reset_timeout_ms == 0 {
            errors.push(ValidationError::ZeroDuration {
                name: breaker.name.clone(),
                field: "reset_timeout_ms",
            });
        }

        let threshold = breaker.error_threshold_percentage;
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            errors.push(ValidationError::ThresholdOutOfRange {
                name: breaker.name.clone(),
                value: threshold,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BreakerConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GuardConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut bad = BreakerConfig::named("api");
        bad.timeout_ms = 0;
        bad.error_threshold_percentage = 120.0;

        let mut config = GuardConfig::default();
        config.observability.log_level = "loud".into();
        config.breakers = vec![bad, BreakerConfig::named("api"), BreakerConfig::named(" ")];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::UnknownLogLevel("loud".into())));
        assert!(errors.contains(&ValidationError::DuplicateName("api".into())));
        assert!(errors.contains(&ValidationError::EmptyName { index: 2 }));
        assert!(errors.contains(&ValidationError::ZeroDuration {
            name: "api".into(),
            field: "timeout_ms",
        }));
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let mut breaker = BreakerConfig::named("api");
        breaker.error_threshold_percentage = f64::NAN;
        let config = GuardConfig {
            breakers: vec![breaker],
            ..GuardConfig::default()
        };

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::ThresholdOutOfRange { .. }));
    }
}
