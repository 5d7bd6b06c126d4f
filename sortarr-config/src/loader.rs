use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use crate::models::Config;

/// Environment variable consulted when no config path is given explicitly.
pub const CONFIG_PATH_ENV: &str = "SORTARR_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("no config path given and ${CONFIG_PATH_ENV} is unset")]
    NoPath,
}

/// Load and validate a config from an explicit TOML path.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating config file {}", path.display()))?;
    info!(path = %path.display(), roots = config.roots.len(), "config loaded");
    Ok(config)
}

/// Load from the given path, or fall back to `$SORTARR_CONFIG`.
pub fn load_from_env(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path: PathBuf = match explicit {
        Some(path) => path.to_path_buf(),
        None => match env::var_os(CONFIG_PATH_ENV) {
            Some(value) if !value.is_empty() => PathBuf::from(value),
            _ => return Err(ConfigLoadError::NoPath.into()),
        },
    };
    load(&path)
}
