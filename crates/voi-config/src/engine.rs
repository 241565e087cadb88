//! Engine configuration types.
//!
//! Every section carries `#[serde(default)]` so a file only needs to name the
//! values it overrides.

use crate::validate::ValidationError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub schema_version: String,
    pub monte_carlo: MonteCarloConfig,
    pub posterior_grid: GridConfig,
    pub truncation: TruncationConfig,
    pub timing: TimingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            monte_carlo: MonteCarloConfig::default(),
            posterior_grid: GridConfig::default(),
            truncation: TruncationConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

/// Pre-posterior simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    /// Iterations per EVSI / net-value run.
    pub num_samples: usize,
    /// Fixed RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Re-draw attempts for a non-finite prior draw before falling back.
    pub max_redraws: u32,
    /// Iterations between cancellation checks.
    pub cancel_check_interval: usize,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            num_samples: 10_000,
            seed: None,
            max_redraws: 10,
            cancel_check_interval: 256,
        }
    }
}

/// Numerical posterior grid used for non-Normal (or truncated) priors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of grid points.
    pub points: usize,
    /// Prior mass left outside the grid in each unbounded tail.
    pub tail_mass: f64,
    /// Half-width of the likelihood window, in standard errors.
    pub window_se: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            points: 2001,
            tail_mass: 1e-6,
            window_se: 10.0,
        }
    }
}

/// Feasibility bound on lift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruncationConfig {
    /// Lowest physically possible lift (a total loss).
    pub lower_bound: f64,
    /// Untruncated mass below the bound that triggers truncation.
    pub tolerance: f64,
}

impl Default for TruncationConfig {
    fn default() -> Self {
        Self {
            lower_bound: -1.0,
            tolerance: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Planning horizon of the net-value simulation, in days.
    pub horizon_days: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            horizon_days: 365.0,
        }
    }
}

impl EngineConfig {
    /// Load a config file. `.toml` files are parsed as TOML, anything else as JSON.
    pub fn from_file(path: &Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        if is_toml {
            Self::parse_toml(&content)
        } else {
            Self::parse_json(&content)
        }
    }

    /// Parse a config from a JSON string.
    pub fn parse_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Parse a config from a TOML string.
    pub fn parse_toml(text: &str) -> Result<Self, ValidationError> {
        toml::from_str(text)
            .map_err(|e| ValidationError::ParseError(format!("Invalid TOML: {}", e)))
    }
}
