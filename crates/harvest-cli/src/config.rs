//! Configuration Vault – reads/writes `~/.harvest/config.toml`.

use harvest_runtime::TutorConfig;
use harvest_types::HarvestError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted user configuration stored in `~/.harvest/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Scene manifest loaded at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<PathBuf>,

    /// Default target of `/export` when no path is given.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Solver, scoring and scene-name tunables.
    #[serde(default)]
    pub tutor: TutorConfig,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scene: None,
            export_dir: default_export_dir(),
            tutor: TutorConfig::default(),
        }
    }
}

/// Return the path to `~/.harvest/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".harvest").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, HarvestError> {
    load_from(&config_path())
}

/// Load the config from a specific path and apply environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, HarvestError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        HarvestError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| HarvestError::Config(format!("failed to parse config: {e}")))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `HARVEST_*` environment variable overrides to `cfg`.
///
/// Values that do not parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `HARVEST_CLAMP_LOW` | `tutor.jaw.clamp_low_deg` |
/// | `HARVEST_CLAMP_HIGH` | `tutor.jaw.clamp_high_deg` |
/// | `HARVEST_DEBOUNCE_MS` | `tutor.scoring.debounce_ms` |
/// | `HARVEST_BRANCH_THRESHOLD` | `tutor.scoring.branch_cut_distance` |
/// | `HARVEST_SCENE` | `scene` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(v) = env_parse::<f64>("HARVEST_CLAMP_LOW") {
        cfg.tutor.jaw.clamp_low_deg = v;
    }
    if let Some(v) = env_parse::<f64>("HARVEST_CLAMP_HIGH") {
        cfg.tutor.jaw.clamp_high_deg = v;
    }
    if let Some(v) = env_parse::<u64>("HARVEST_DEBOUNCE_MS") {
        cfg.tutor.scoring.debounce_ms = v;
    }
    if let Some(v) = env_parse::<f64>("HARVEST_BRANCH_THRESHOLD")
        && v.is_finite()
        && v > 0.0
    {
        cfg.tutor.scoring.branch_cut_distance = v;
    }
    if let Ok(v) = std::env::var("HARVEST_SCENE")
        && !v.trim().is_empty()
    {
        cfg.scene = Some(PathBuf::from(v));
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

/// Save the config to disk, creating `~/.harvest/` if necessary.
pub fn save(cfg: &Config) -> Result<(), HarvestError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), HarvestError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            HarvestError::Config(format!("failed to create config directory: {e}"))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| HarvestError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        HarvestError::Config(format!("failed to write config at {}: {e}", path.display()))
    })
}
