// src/config.rs

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{APP_DIR, CONFIG_FILENAME};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not find the system configuration directory.")]
    NoConfigDir,
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML in '{path}': {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize the configuration to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

type ConfigResult<T> = Result<T, ConfigError>;

/// What happens when a candidate passes its checks but an argument fails to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Try the next overload; report the conversion failure only if none matches.
    #[default]
    Cascade,
    /// Stop at the first conversion failure.
    Fail,
}

/// Dispatcher settings, usually read from `parley.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Input must start with one of these to be treated as a command. Empty
    /// means every line is a command.
    pub prefixes: Vec<String>,
    pub read_failure: ReadFailurePolicy,
    /// `env_logger` filter used when `RUST_LOG` is not set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Returns parley's configuration directory, creating it if needed.
pub fn get_config_dir() -> ConfigResult<PathBuf> {
    let config_path = dirs::config_dir()
        .ok_or(ConfigError::NoConfigDir)?
        .join(APP_DIR);
    log::debug!("Config directory: {:?}", config_path);
    if !config_path.exists() {
        fs::create_dir_all(&config_path)?;
    }
    Ok(config_path)
}

pub fn default_config_path() -> ConfigResult<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

pub fn load_config(path: &Path) -> ConfigResult<DispatchConfig> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.display().to_string(),
        source,
    })
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_or_default(path: &Path) -> ConfigResult<DispatchConfig> {
    if !path.exists() {
        log::info!("No config at {:?}; using defaults.", path);
        return Ok(DispatchConfig::default());
    }
    load_config(path)
}

pub fn save_config(path: &Path, config: &DispatchConfig) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let toml_string = toml::to_string_pretty(config)?;
    fs::write(path, toml_string)?;
    log::info!("Configuration written to {:?}", path);
    Ok(())
}
