//! Configuration presets trading accuracy for speed.
//!
//! - Fast: interactive what-if exploration
//! - Standard: the built-in defaults
//! - Precise: reporting runs where Monte Carlo noise should be negligible

use crate::engine::{EngineConfig, GridConfig, MonteCarloConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Available configuration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    Fast,
    Standard,
    Precise,
}

impl PresetName {
    /// All available preset names.
    pub const ALL: &'static [PresetName] =
        &[PresetName::Fast, PresetName::Standard, PresetName::Precise];

    /// Get preset name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PresetName::Fast => "fast",
            PresetName::Standard => "standard",
            PresetName::Precise => "precise",
        }
    }

    /// Parse preset name from string.
    pub fn parse(s: &str) -> Option<PresetName> {
        match s.to_lowercase().as_str() {
            "fast" | "quick" | "draft" => Some(PresetName::Fast),
            "standard" | "default" => Some(PresetName::Standard),
            "precise" | "accurate" | "report" => Some(PresetName::Precise),
            _ => None,
        }
    }

    /// Get a description of the preset.
    pub fn description(&self) -> &'static str {
        match self {
            PresetName::Fast => "Few samples and a coarse posterior grid for interactive exploration",
            PresetName::Standard => "Built-in defaults balancing accuracy and run time",
            PresetName::Precise => "Many samples and a fine posterior grid for final reports",
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PresetName {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PresetName::parse(s).ok_or_else(|| PresetError::UnknownPreset(s.to_string()))
    }
}

/// Errors related to preset operations.
#[derive(Error, Debug, Clone)]
pub enum PresetError {
    #[error("Unknown preset '{0}'. Available: fast, standard, precise")]
    UnknownPreset(String),
}

/// Get the engine config for a preset.
pub fn get_preset(name: PresetName) -> EngineConfig {
    match name {
        PresetName::Fast => fast_preset(),
        PresetName::Standard => EngineConfig::default(),
        PresetName::Precise => precise_preset(),
    }
}

fn fast_preset() -> EngineConfig {
    EngineConfig {
        monte_carlo: MonteCarloConfig {
            num_samples: 2_000,
            ..MonteCarloConfig::default()
        },
        posterior_grid: GridConfig {
            points: 501,
            ..GridConfig::default()
        },
        ..EngineConfig::default()
    }
}

fn precise_preset() -> EngineConfig {
    EngineConfig {
        monte_carlo: MonteCarloConfig {
            num_samples: 50_000,
            ..MonteCarloConfig::default()
        },
        posterior_grid: GridConfig {
            points: 4001,
            tail_mass: 1e-8,
            ..GridConfig::default()
        },
        ..EngineConfig::default()
    }
}

impl EngineConfig {
    /// Overlay a preset's sampling and grid settings.
    ///
    /// Truncation, timing and an explicit seed are left untouched.
    pub fn apply_preset(&mut self, name: PresetName) {
        let preset = get_preset(name);
        let seed = self.monte_carlo.seed;
        self.monte_carlo = preset.monte_carlo;
        self.monte_carlo.seed = seed;
        self.posterior_grid = preset.posterior_grid;
    }
}

/// Summary information about a preset.
#[derive(Debug, Clone, Serialize)]
pub struct PresetInfo {
    pub name: String,
    pub description: String,
    pub num_samples: usize,
    pub grid_points: usize,
}

impl PresetInfo {
    pub fn from_preset(name: PresetName) -> Self {
        let cfg = get_preset(name);
        Self {
            name: name.as_str().to_string(),
            description: name.description().to_string(),
            num_samples: cfg.monte_carlo.num_samples,
            grid_points: cfg.posterior_grid.points,
        }
    }
}

/// List all available presets with summary information.
pub fn list_presets() -> Vec<PresetInfo> {
    PresetName::ALL
        .iter()
        .map(|&name| PresetInfo::from_preset(name))
        .collect()
}
