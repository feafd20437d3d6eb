use std::path::Path;

use bazaar_core::ClientConfig;

use crate::cli::ConfigCommands;
use crate::error::CliError;
use crate::settings::{load_config, resolve_config_path, save_config};

pub fn run_config(
    command: ConfigCommands,
    config_path: Option<&Path>,
    api_url_flag: Option<&str>,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_base_url,
            countdown_tick_ms,
            notification_poll_ms,
            request_timeout_secs,
        } => {
            let path = resolve_config_path(config_path)?;
            let existing = ClientConfig::load_from_path(&path)?;
            let updated = merge_config_init(
                existing,
                api_base_url.or_else(|| api_url_flag.map(str::to_string)),
                countdown_tick_ms,
                notification_poll_ms,
                request_timeout_secs,
            )?;
            save_config(&updated, &path)?;
            println!("Saved config to {}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let path = resolve_config_path(config_path)?;
            let config = load_config(config_path, api_url_flag)?;
            println!("# {}", path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Apply explicit `config init` values over the stored file contents.
pub fn merge_config_init(
    mut config: ClientConfig,
    api_base_url: Option<String>,
    countdown_tick_ms: Option<u64>,
    notification_poll_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
) -> Result<ClientConfig, CliError> {
    if let Some(url) = bazaar_core::util::normalize_text_option(api_base_url) {
        config.api_base_url = Some(url);
    }
    if let Some(tick) = countdown_tick_ms {
        config.countdown_tick_ms = tick;
    }
    if let Some(poll) = notification_poll_ms {
        config.notification_poll_ms = poll;
    }
    if let Some(timeout) = request_timeout_secs {
        config.request_timeout_secs = timeout;
    }
    config.validated().map_err(CliError::from)
}
