//! Bazaar CLI - storefront client for the terminal
//!
//! Follows auction countdowns, watches notifications, toggles favorites, and
//! confirms checkouts against the marketplace API.

mod cli;
mod commands;
mod credentials;
mod error;
mod settings;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::confirm::run_confirm;
use crate::commands::countdown::run_countdown;
use crate::commands::favorite::run_favorite;
use crate::commands::notifications::run_notifications;
use crate::commands::session::{run_login, run_logout, run_register, run_status};
use crate::error::CliError;
use crate::settings::load_config;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "bazaar=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    let api_url = cli.api_url.as_deref();

    match cli.command {
        Commands::Login { email, password } => {
            run_login(load_config(config_path, api_url)?, &email, &password).await
        }
        Commands::Register {
            email,
            password,
            name,
        } => run_register(load_config(config_path, api_url)?, &email, &password, name).await,
        Commands::Logout => run_logout(load_config(config_path, api_url)?).await,
        Commands::Status { json } => run_status(load_config(config_path, api_url)?, json).await,
        Commands::Countdown { deadline, tick_ms } => {
            run_countdown(load_config(config_path, api_url)?, &deadline, tick_ms).await
        }
        Commands::Notifications { interval_ms, once } => {
            run_notifications(load_config(config_path, api_url)?, interval_ms, once).await
        }
        Commands::Favorite { object_id } => {
            run_favorite(load_config(config_path, api_url)?, &object_id).await
        }
        Commands::Confirm {
            transaction_id,
            session_id,
            json,
        } => {
            run_confirm(
                load_config(config_path, api_url)?,
                &transaction_id,
                session_id.as_deref(),
                json,
            )
            .await
        }
        Commands::Config { command } => run_config(command, config_path, api_url),
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}
