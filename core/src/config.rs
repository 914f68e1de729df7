use std::{env, fs, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::store::DEFAULT_MAX_BATCH_OPS;

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Upper bound on operations per atomic commit.
    #[serde(default = "default_max_batch_ops")]
    pub max_batch_ops: usize,
    /// When set, content updates also rewrite the membership stamp from the
    /// current workspace instead of leaving the insert-time stamp untouched.
    #[serde(default)]
    pub restamp_membership_on_update: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_batch_ops: default_max_batch_ops(),
            restamp_membership_on_update: false,
        }
    }
}

impl SyncConfig {
    const CONFIG_ENV: &'static str = "HEARTH_CONFIG_FILE";
    const MAX_BATCH_OPS_ENV: &'static str = "HEARTH_MAX_BATCH_OPS";
    const RESTAMP_ENV: &'static str = "HEARTH_RESTAMP_ON_UPDATE";

    /// Load configuration from defaults layered with optional config files and
    /// environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    pub fn load_with(config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::resolve_config_path(config_path)? {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            let file_config: Self = toml::from_str(&contents)
                .with_context(|| format!("invalid config file: {}", path.display()))?;

            config = file_config;
        }

        if let Ok(value) = env::var(Self::MAX_BATCH_OPS_ENV) {
            config.max_batch_ops = value
                .trim()
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::MAX_BATCH_OPS_ENV))?;
        }

        if let Ok(value) = env::var(Self::RESTAMP_ENV) {
            config.restamp_membership_on_update = parse_bool(value.trim())
                .ok_or_else(|| anyhow!("invalid {name}", name = Self::RESTAMP_ENV))?;
        }

        Ok(config)
    }

    fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            return Self::validate_path(path);
        }

        if let Ok(path) = env::var(Self::CONFIG_ENV) {
            return Self::validate_path(PathBuf::from(path));
        }

        let mut candidates = vec![PathBuf::from("hearth.toml")];
        if let Some(dir) = Self::default_config_dir() {
            candidates.push(dir.join("config.toml"));
        }

        for candidate in candidates {
            if candidate.exists() {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    fn validate_path(path: PathBuf) -> Result<Option<PathBuf>> {
        if path.exists() {
            Ok(Some(path))
        } else {
            Err(anyhow!(
                "configuration file does not exist: {}",
                path.display()
            ))
        }
    }

    fn default_config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".hearth"))
    }
}

fn default_max_batch_ops() -> usize {
    DEFAULT_MAX_BATCH_OPS
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn home_dir() -> Option<PathBuf> {
    if let Some(path) = env::var_os("HOME") {
        return Some(PathBuf::from(path));
    }

    if let Some(path) = env::var_os("USERPROFILE") {
        return Some(PathBuf::from(path));
    }

    None
}
