//! Configuration loading: defaults, then the TOML file, then environment.
//!
//! Env overrides: PARLEY_SAVE_PATH, PARLEY_NODES_PATH,
//! PARLEY_RECONNECT_ATTEMPTS, PARLEY_RECONNECT_BACKOFF_SECS,
//! PARLEY_HONOR_PAUSE, PARLEY_MAX_TRANSFER_SIZE, PARLEY_AVATAR_FILENAME.

use anyhow::{Context, Result};
use parley_core::SessionConfig;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Where the configuration lives unless `--config` says otherwise.
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/parley/config.toml";

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).into_owned()),
    }
}

/// Load the effective configuration.
///
/// A missing file at the default location means defaults. A missing file at
/// any other location is an error.
pub fn load(path: &str) -> Result<SessionConfig> {
    let file = expand(path);
    let config = if file.exists() {
        from_file(&file)?
    } else if path == DEFAULT_CONFIG_PATH {
        debug!(path = %file.display(), "No config file, using defaults");
        SessionConfig::default()
    } else {
        anyhow::bail!("Config file not found: {}", file.display());
    };

    apply_env(config, |key| std::env::var(key).ok())
}

fn from_file(path: &Path) -> Result<SessionConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut config: SessionConfig =
        toml::from_str(&text).with_context(|| format!("Invalid config in {}", path.display()))?;

    config.save_path = config.save_path.map(|p| expand(&p.to_string_lossy()));
    config.nodes_path = config.nodes_path.map(|p| expand(&p.to_string_lossy()));
    Ok(config)
}

/// Apply `PARLEY_*` overrides read through `var`.
pub fn apply_env<F>(mut config: SessionConfig, var: F) -> Result<SessionConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = var("PARLEY_SAVE_PATH") {
        config.save_path = Some(expand(&v));
    }
    if let Some(v) = var("PARLEY_NODES_PATH") {
        config.nodes_path = Some(expand(&v));
    }
    if let Some(v) = var("PARLEY_RECONNECT_ATTEMPTS") {
        config.reconnect_attempts = parse_var("PARLEY_RECONNECT_ATTEMPTS", &v)?;
    }
    if let Some(v) = var("PARLEY_RECONNECT_BACKOFF_SECS") {
        config.reconnect_backoff_secs = parse_var("PARLEY_RECONNECT_BACKOFF_SECS", &v)?;
    }
    if let Some(v) = var("PARLEY_HONOR_PAUSE") {
        config.honor_pause = parse_var("PARLEY_HONOR_PAUSE", &v)?;
    }
    if let Some(v) = var("PARLEY_MAX_TRANSFER_SIZE") {
        config.max_transfer_size = parse_var("PARLEY_MAX_TRANSFER_SIZE", &v)?;
    }
    if let Some(v) = var("PARLEY_AVATAR_FILENAME") {
        config.avatar_filename = v;
    }
    Ok(config)
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", key, value))
}
