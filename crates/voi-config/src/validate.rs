//! Configuration validation errors and semantic validation.

use crate::engine::EngineConfig;
use thiserror::Error;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Upper bound on Monte Carlo iterations accepted from a config file.
pub const MAX_NUM_SAMPLES: usize = 10_000_000;
/// Upper bound on posterior grid points.
pub const MAX_GRID_POINTS: usize = 100_001;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

fn invalid(field: &str, message: String) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message,
    }
}

/// Validate an engine config semantically.
pub fn validate_engine_config(config: &EngineConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    let mc = &config.monte_carlo;
    if mc.num_samples == 0 || mc.num_samples > MAX_NUM_SAMPLES {
        return Err(invalid(
            "monte_carlo.num_samples",
            format!("Must be in [1, {}], got {}", MAX_NUM_SAMPLES, mc.num_samples),
        ));
    }
    if mc.max_redraws == 0 {
        return Err(invalid(
            "monte_carlo.max_redraws",
            "Must be at least 1".to_string(),
        ));
    }
    if mc.cancel_check_interval == 0 {
        return Err(invalid(
            "monte_carlo.cancel_check_interval",
            "Must be at least 1".to_string(),
        ));
    }

    let grid = &config.posterior_grid;
    if grid.points < 3 || grid.points > MAX_GRID_POINTS {
        return Err(invalid(
            "posterior_grid.points",
            format!("Must be in [3, {}], got {}", MAX_GRID_POINTS, grid.points),
        ));
    }
    if !(grid.tail_mass > 0.0 && grid.tail_mass < 0.01) {
        return Err(invalid(
            "posterior_grid.tail_mass",
            format!("Must be in (0, 0.01), got {}", grid.tail_mass),
        ));
    }
    if !(grid.window_se.is_finite() && grid.window_se >= 1.0) {
        return Err(invalid(
            "posterior_grid.window_se",
            format!("Must be finite and >= 1, got {}", grid.window_se),
        ));
    }

    let trunc = &config.truncation;
    if !trunc.lower_bound.is_finite() {
        return Err(invalid(
            "truncation.lower_bound",
            format!("Must be finite, got {}", trunc.lower_bound),
        ));
    }
    if !(0.0..1.0).contains(&trunc.tolerance) {
        return Err(invalid(
            "truncation.tolerance",
            format!("Must be in [0, 1), got {}", trunc.tolerance),
        ));
    }

    let horizon = config.timing.horizon_days;
    if !(horizon.is_finite() && horizon > 0.0) {
        return Err(invalid(
            "timing.horizon_days",
            format!("Must be finite and positive, got {}", horizon),
        ));
    }

    Ok(())
}
