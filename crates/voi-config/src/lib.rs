//! Experiment value-of-information engine configuration.
//!
//! This crate provides:
//! - Typed Rust structs for the engine config file (JSON or TOML)
//! - Config resolution (CLI → env → XDG → defaults)
//! - Presets trading accuracy for speed
//! - Semantic validation

pub mod engine;
pub mod preset;
pub mod resolve;
pub mod validate;

pub use engine::{
    EngineConfig, GridConfig, MonteCarloConfig, TimingConfig, TruncationConfig,
};
pub use preset::{get_preset, list_presets, PresetError, PresetInfo, PresetName};
pub use resolve::{load_engine_config, resolve_config, ConfigPaths, ConfigSource, LoadedConfig};
pub use validate::{validate_engine_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
