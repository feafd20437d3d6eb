//! Client config file discovery and layering.
//!
//! Precedence, lowest first: config file, `BAZAAR_*` environment, CLI flags.

use std::path::{Path, PathBuf};

use bazaar_core::config::normalize_base_url;
use bazaar_core::ClientConfig;

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "config.json";

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("bazaar").join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve config directory".to_string()))
}

pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, CliError> {
    explicit.map_or_else(default_config_path, |path| Ok(path.to_path_buf()))
}

pub fn load_config(
    explicit_path: Option<&Path>,
    api_url_flag: Option<&str>,
) -> Result<ClientConfig, CliError> {
    let path = resolve_config_path(explicit_path)?;
    let config = ClientConfig::load_from_path(&path)?;
    let mut config = config.with_env_overrides(|key| std::env::var(key).ok())?;
    apply_api_url_flag(&mut config, api_url_flag)?;
    Ok(config)
}

pub fn apply_api_url_flag(config: &mut ClientConfig, flag: Option<&str>) -> Result<(), CliError> {
    if let Some(url) = flag.map(str::trim).filter(|url| !url.is_empty()) {
        config.api_base_url = Some(normalize_base_url(url)?);
    }
    Ok(())
}

/// Layer `--tick-ms`/`--interval-ms` over the loaded config and re-check the
/// cadence limits.
pub fn apply_cadence_flags(
    mut config: ClientConfig,
    tick_ms: Option<u64>,
    interval_ms: Option<u64>,
) -> Result<ClientConfig, CliError> {
    if let Some(tick) = tick_ms {
        config.countdown_tick_ms = tick;
    }
    if let Some(interval) = interval_ms {
        config.notification_poll_ms = interval;
    }
    config.validated().map_err(CliError::from)
}

pub fn save_config(config: &ClientConfig, path: &Path) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|error| {
            CliError::Config(format!(
                "Failed to create config directory {}: {}",
                parent.display(),
                error
            ))
        })?;
    }

    let serialized = serde_json::to_string_pretty(config)?;
    std::fs::write(path, serialized).map_err(|error| {
        CliError::Config(format!(
            "Failed to write config at {}: {}",
            path.display(),
            error
        ))
    })
}
