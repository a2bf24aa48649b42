//! Error types for the diagnostics engine.

use thiserror::Error;

/// Constructor-time configuration failures.
///
/// Configuration problems are fatal and must name the offending field;
/// they are never deferred to first use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid config field `{field}`: {reason}")]
pub struct ConfigError {
    /// Name of the field that failed validation.
    pub field: &'static str,

    /// Human-readable constraint that was violated.
    pub reason: String,
}

impl ConfigError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Validate that a numeric config field is finite and within `[lo, hi]`.
pub(crate) fn require_in_range(
    field: &'static str,
    value: f64,
    lo: f64,
    hi: f64,
) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::new(field, "must be a finite number"));
    }
    if value < lo || value > hi {
        return Err(ConfigError::new(
            field,
            format!("must be within [{lo}, {hi}], got {value}"),
        ));
    }
    Ok(())
}

/// Validate that a numeric config field is finite and non-negative.
pub(crate) fn require_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::new(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(ConfigError::new(
            field,
            format!("must be non-negative, got {value}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_field() {
        let err = ConfigError::new("band_margin", "must be non-negative, got -0.1");
        let message = err.to_string();
        assert!(message.contains("band_margin"));
        assert!(message.contains("non-negative"));
    }

    #[test]
    fn test_range_validation() {
        assert!(require_in_range("t", 0.5, 0.0, 1.0).is_ok());
        assert!(require_in_range("t", 1.5, 0.0, 1.0).is_err());
        assert!(require_in_range("t", f64::NAN, 0.0, 1.0).is_err());
        assert!(require_non_negative("t", 0.0).is_ok());
        assert!(require_non_negative("t", -0.01).is_err());
    }
}
