//! No-mock configuration validation + resolution tests.
//!
//! Covers:
//! - Loading JSON and TOML engine configs from real files
//! - Resolution order (CLI > env > config dir > XDG > default)
//! - Validation failures surfaced from files
//! - Preset determinism

use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;
use voi_config::preset::{get_preset, list_presets, PresetName};
use voi_config::resolve::{load_engine_config, resolve_config, ConfigSource};
use voi_config::validate::ValidationError;
use voi_config::EngineConfig;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const ENV_KEYS: &[&str] = &["VOI_ENGINE_CONFIG", "VOI_CONFIG_DIR", "XDG_CONFIG_HOME"];

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let mut saved = Vec::with_capacity(keys.len());
        for key in keys {
            saved.push(env::var(key).ok());
            env::remove_var(key);
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (idx, key) in self.keys.iter().enumerate() {
            match self.saved.get(idx).and_then(|v| v.as_ref()) {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f()
}

fn write_json(path: &Path, samples: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    let body = format!(
        r#"{{"schema_version": "1.0.0", "monte_carlo": {{"num_samples": {}, "seed": 11}}}}"#,
        samples
    );
    fs::write(path, body).expect("write json config");
}

fn write_toml(path: &Path, samples: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    let body = format!(
        "[monte_carlo]\nnum_samples = {}\n\n[timing]\nhorizon_days = 90.0\n",
        samples
    );
    fs::write(path, body).expect("write toml config");
}

#[test]
fn test_resolve_config_cli_over_env() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let cli = temp.path().join("cli").join("engine.json");
        let from_env = temp.path().join("env").join("engine.json");
        write_json(&cli, 111);
        write_json(&from_env, 222);
        env::set_var("VOI_ENGINE_CONFIG", from_env.display().to_string());

        let paths = resolve_config(Some(&cli));
        assert_eq!(paths.source, ConfigSource::CliArgument);
        assert_eq!(paths.engine.as_deref(), Some(cli.as_path()));

        let loaded = load_engine_config(Some(&cli)).expect("load");
        assert_eq!(loaded.config.monte_carlo.num_samples, 111);
        assert_eq!(loaded.config.monte_carlo.seed, Some(11));
    });
}

#[test]
fn test_resolve_config_env_over_config_dir() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let from_env = temp.path().join("env").join("custom.json");
        let config_dir = temp.path().join("config_dir");
        write_json(&from_env, 333);
        write_json(&config_dir.join("engine.json"), 444);
        env::set_var("VOI_ENGINE_CONFIG", from_env.display().to_string());
        env::set_var("VOI_CONFIG_DIR", config_dir.display().to_string());

        let loaded = load_engine_config(None).expect("load");
        assert_eq!(loaded.source, ConfigSource::Environment);
        assert_eq!(loaded.config.monte_carlo.num_samples, 333);
    });
}

#[test]
fn test_config_dir_accepts_toml() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let config_dir = temp.path().join("config_dir");
        write_toml(&config_dir.join("engine.toml"), 555);
        env::set_var("VOI_CONFIG_DIR", config_dir.display().to_string());

        let loaded = load_engine_config(None).expect("load");
        assert_eq!(loaded.source, ConfigSource::Environment);
        assert_eq!(loaded.config.monte_carlo.num_samples, 555);
        assert_eq!(loaded.config.timing.horizon_days, 90.0);
        assert_eq!(loaded.path, Some(config_dir.join("engine.toml")));
    });
}

#[test]
fn test_resolve_config_xdg_fallback() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let xdg_dir = temp.path().join("xdg");
        let app_file = xdg_dir.join("experiment-voi").join("engine.json");
        write_json(&app_file, 666);
        env::set_var("XDG_CONFIG_HOME", xdg_dir.display().to_string());

        let paths = resolve_config(None);
        assert_eq!(paths.source, ConfigSource::XdgConfig);
        assert_eq!(paths.engine, Some(app_file));
    });
}

#[test]
fn test_builtin_default_when_nothing_found() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        env::set_var("XDG_CONFIG_HOME", temp.path().display().to_string());

        let loaded = load_engine_config(None).expect("load");
        assert_eq!(loaded.source, ConfigSource::BuiltinDefault);
        assert!(loaded.path.is_none());
        assert_eq!(loaded.config, EngineConfig::default());
    });
}

#[test]
fn test_invalid_file_is_rejected_on_load() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("engine.json");
        write_json(&path, 0);

        let err = load_engine_config(Some(&path)).expect_err("zero samples should fail");
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    });
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("engine.toml");
    fs::write(&path, "[monte_carlo\nnum_samples = ").expect("write");
    let err = EngineConfig::from_file(&path).expect_err("should fail");
    assert!(matches!(err, ValidationError::ParseError(_)));
    assert_eq!(err.code(), 61);
}

#[test]
fn test_presets_are_deterministic() {
    let first = get_preset(PresetName::Precise);
    let second = get_preset(PresetName::Precise);
    let first_json = serde_json::to_string(&first).expect("serialize preset");
    let second_json = serde_json::to_string(&second).expect("serialize preset");
    assert_eq!(first_json, second_json);

    let presets = list_presets();
    assert!(presets.iter().any(|p| p.name == PresetName::Precise.as_str()));
}
