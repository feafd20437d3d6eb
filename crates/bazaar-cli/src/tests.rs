use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bazaar_core::{
    ClientConfig, ConfirmationStatus, ConfirmationTicket, CountdownState, ObjectId, SyncError,
    ToggleOutcome,
};
use clap::Parser;
use pretty_assertions::assert_eq;

use crate::cli::{Cli, Commands, CompletionShell, ConfigCommands};
use crate::commands::common::{
    format_confirmation_lines, format_countdown_line, format_toggle_outcome, parse_deadline,
};
use crate::commands::completions::render_completions;
use crate::commands::config::merge_config_init;
use crate::error::CliError;
use crate::settings::{apply_api_url_flag, apply_cadence_flags, save_config};

fn unique_test_path(name: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let sequence = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("bazaar-cli-{name}-{nanos}-{sequence}.json"))
}

#[test]
fn parses_confirm_with_session_id() {
    let cli = Cli::parse_from([
        "bazaar",
        "confirm",
        "tx-42",
        "--session-id",
        "cs_test_1",
        "--api-url",
        "https://shop.example.com/api",
    ]);
    assert_eq!(cli.api_url.as_deref(), Some("https://shop.example.com/api"));
    match cli.command {
        Commands::Confirm {
            transaction_id,
            session_id,
            json,
        } => {
            assert_eq!(transaction_id, "tx-42");
            assert_eq!(session_id.as_deref(), Some("cs_test_1"));
            assert!(!json);
        }
        _ => panic!("expected confirm command"),
    }
}

#[test]
fn parses_config_init_values() {
    let cli = Cli::parse_from([
        "bazaar",
        "config",
        "init",
        "--api-base-url",
        "https://shop.example.com",
        "--notification-poll-ms",
        "15000",
    ]);
    match cli.command {
        Commands::Config {
            command:
                ConfigCommands::Init {
                    api_base_url,
                    notification_poll_ms,
                    countdown_tick_ms,
                    ..
                },
        } => {
            assert_eq!(api_base_url.as_deref(), Some("https://shop.example.com"));
            assert_eq!(notification_poll_ms, Some(15_000));
            assert_eq!(countdown_tick_ms, None);
        }
        _ => panic!("expected config init command"),
    }
}

#[test]
fn rejects_unknown_command() {
    assert!(Cli::try_parse_from(["bazaar", "bid", "lot-1"]).is_err());
}

#[test]
fn parse_deadline_accepts_rfc3339_only() {
    assert!(parse_deadline("2030-01-01T12:00:00Z").is_ok());
    assert!(parse_deadline(" 2030-01-01T12:00:00+02:00 ").is_ok());
    assert!(matches!(
        parse_deadline("tomorrow"),
        Err(CliError::InvalidDeadline(raw)) if raw == "tomorrow"
    ));
}

#[test]
fn countdown_line_marks_final_hour() {
    let calm = CountdownState {
        remaining: Duration::from_secs(2 * 3_600 + 5),
        expired: false,
        urgent: false,
    };
    let urgent = CountdownState {
        remaining: Duration::from_secs(15 * 60 + 9),
        expired: false,
        urgent: true,
    };
    let ended = CountdownState {
        remaining: Duration::ZERO,
        expired: true,
        urgent: true,
    };
    assert_eq!(format_countdown_line(&calm), "2h 00m 05s");
    assert_eq!(format_countdown_line(&urgent), "15m 09s (ending soon)");
    assert_eq!(format_countdown_line(&ended), "Ended");
}

#[test]
fn toggle_outcome_mentions_reconciliation() {
    let added = ToggleOutcome {
        object_id: ObjectId::new("lot-7"),
        is_favorite: true,
        conflicted: false,
    };
    let corrected = ToggleOutcome {
        object_id: ObjectId::new("lot-7"),
        is_favorite: false,
        conflicted: true,
    };
    assert_eq!(format_toggle_outcome(&added), "Added lot-7 to favorites");
    assert_eq!(
        format_toggle_outcome(&corrected),
        "Removed lot-7 from favorites (updated to match the server)"
    );
}

#[test]
fn unconfirmed_payment_offers_manual_fallback() {
    let ticket = ConfirmationTicket {
        session_id: Some("cs_1".to_string()),
        status: ConfirmationStatus::Unconfirmed,
        failure: Some("API error: escrow unavailable (500)".to_string()),
    };
    let lines = format_confirmation_lines("tx-1", &ticket);
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("escrow unavailable"));
    assert!(lines[2].contains("contact support"));
}

#[test]
fn api_url_flag_overrides_config() {
    let mut config = ClientConfig {
        api_base_url: Some("https://from-file.example.com".to_string()),
        ..ClientConfig::default()
    };
    apply_api_url_flag(&mut config, Some(" https://flag.example.com/api/ ")).unwrap();
    assert_eq!(config.api_base_url.as_deref(), Some("https://flag.example.com/api"));

    apply_api_url_flag(&mut config, Some("   ")).unwrap();
    assert_eq!(config.api_base_url.as_deref(), Some("https://flag.example.com/api"));

    assert!(apply_api_url_flag(&mut config, Some("flag.example.com")).is_err());
}

#[test]
fn config_init_keeps_unspecified_values() {
    let existing = ClientConfig {
        api_base_url: Some("https://shop.example.com".to_string()),
        countdown_tick_ms: 500,
        ..ClientConfig::default()
    };
    let merged = merge_config_init(existing, None, None, Some(60_000), None).unwrap();
    assert_eq!(merged.api_base_url.as_deref(), Some("https://shop.example.com"));
    assert_eq!(merged.countdown_tick_ms, 500);
    assert_eq!(merged.notification_poll_ms, 60_000);

    let rejected = merge_config_init(ClientConfig::default(), None, None, Some(10), None);
    assert!(rejected.is_err());
}

#[test]
fn cadence_flags_are_validated() {
    let applied = apply_cadence_flags(ClientConfig::default(), Some(250), Some(5_000)).unwrap();
    assert_eq!(applied.countdown_tick_ms, 250);
    assert_eq!(applied.notification_poll_ms, 5_000);

    assert!(matches!(
        apply_cadence_flags(ClientConfig::default(), None, Some(0)),
        Err(CliError::Core(SyncError::InvalidConfiguration(_)))
    ));
    assert!(apply_cadence_flags(ClientConfig::default(), None, Some(999)).is_err());
    assert!(apply_cadence_flags(ClientConfig::default(), Some(0), None).is_err());
}

#[test]
fn saved_config_loads_back() {
    let path = unique_test_path("config");
    let config = ClientConfig {
        api_base_url: Some("https://shop.example.com".to_string()),
        ..ClientConfig::default()
    };
    save_config(&config, &path).unwrap();

    let loaded = ClientConfig::load_from_path(&path).unwrap();
    assert_eq!(loaded, config);
    let _ = std::fs::remove_file(path);
}

#[test]
fn completions_use_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("bazaar"));
}
