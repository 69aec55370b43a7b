//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, decay within (0, 1])
//! - Check that scoring weights form a sane blend
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: DispatcherConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::DispatcherConfig;

const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },

    #[error("{field} must be within (0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },

    #[error("scoring weights must sum to 1.0, got {sum:.3}")]
    WeightSum { sum: f64 },

    #[error("retry.max_delay_ms ({max}) must be >= retry.base_delay_ms ({base})")]
    DelayOrdering { base: u64, max: u64 },
}

/// Validate a parsed configuration, collecting every error found.
pub fn validate_config(config: &DispatcherConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "circuit_breaker.failure_threshold",
        });
    }
    if config.circuit_breaker.success_threshold == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "circuit_breaker.success_threshold",
        });
    }
    if config.circuit_breaker.recovery_timeout_secs == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "circuit_breaker.recovery_timeout_secs",
        });
    }

    if config.retry.base_delay_ms == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "retry.base_delay_ms",
        });
    }
    if config.retry.max_delay_ms < config.retry.base_delay_ms {
        errors.push(ValidationError::DelayOrdering {
            base: config.retry.base_delay_ms,
            max: config.retry.max_delay_ms,
        });
    }
    if config.retry.timeout_per_attempt_secs == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "retry.timeout_per_attempt_secs",
        });
    }

    let weights = &config.router.weights;
    for (field, value) in [
        ("router.weights.capability", weights.capability),
        ("router.weights.performance", weights.performance),
        ("router.weights.load", weights.load),
        ("router.weights.cost", weights.cost),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ValidationError::OutOfUnitRange { field, value });
        }
    }
    let sum = weights.capability + weights.performance + weights.load + weights.cost;
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        errors.push(ValidationError::WeightSum { sum });
    }

    if config.router.queue_capacity == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "router.queue_capacity",
        });
    }
    if !(config.router.load_decay > 0.0 && config.router.load_decay <= 1.0) {
        errors.push(ValidationError::OutOfUnitRange {
            field: "router.load_decay",
            value: config.router.load_decay,
        });
    }
    if config.router.load_decay_interval_secs == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "router.load_decay_interval_secs",
        });
    }

    if config.probe.enabled {
        if config.probe.interval_secs == 0 {
            errors.push(ValidationError::MustBePositive {
                field: "probe.interval_secs",
            });
        }
        if config.probe.timeout_secs == 0 {
            errors.push(ValidationError::MustBePositive {
                field: "probe.timeout_secs",
            });
        }
    }

    if config.orchestrator.max_fallback_attempts == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "orchestrator.max_fallback_attempts",
        });
    }
    if config.orchestrator.result_retention == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "orchestrator.result_retention",
        });
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

    #[test]
    fn test_default_config_validates() {
        assert!(validate_config(&DispatcherConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_multiple_errors() {
        let mut config = DispatcherConfig::default();
        config.circuit_breaker.failure_threshold = 0;
        config.router.load_decay = 1.5;
        config.retry.base_delay_ms = 5000;
        config.retry.max_delay_ms = 1000;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::MustBePositive {
            field: "circuit_breaker.failure_threshold"
        }));
    }

    #[test]
    fn test_weight_sum_checked() {
        let mut config = DispatcherConfig::default();
        config.router.weights.capability = 0.9;

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::WeightSum { .. }));
    }
}
