use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(about = "Browse auctions, favorites, and checkouts from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Marketplace API base URL (overrides config and BAZAAR_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Optional path to the client config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session in the keychain
    Login {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Create an account
    Register {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        /// Optional display name
        #[arg(long, value_name = "NAME")]
        name: Option<String>,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show who is signed in
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow an auction countdown until it ends
    Countdown {
        /// Deadline as an RFC 3339 timestamp
        deadline: String,
        /// Tick interval in milliseconds (defaults to config)
        #[arg(long, value_name = "MS")]
        tick_ms: Option<u64>,
    },
    /// Watch the unread notification count
    Notifications {
        /// Poll interval in milliseconds (defaults to config)
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,
        /// Print the first successful count and exit
        #[arg(long)]
        once: bool,
    },
    /// Add or remove a listing from favorites
    Favorite {
        /// Listing object ID
        object_id: String,
    },
    /// Confirm payment after returning from checkout
    Confirm {
        /// Transaction ID
        transaction_id: String,
        /// Checkout session ID from the return URL
        #[arg(long, value_name = "ID")]
        session_id: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the client config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write or update the config file
    Init {
        /// Marketplace API base URL
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Countdown tick interval in milliseconds
        #[arg(long, value_name = "MS")]
        countdown_tick_ms: Option<u64>,
        /// Notification poll interval in milliseconds
        #[arg(long, value_name = "MS")]
        notification_poll_ms: Option<u64>,
        /// HTTP request timeout in seconds
        #[arg(long, value_name = "SECS")]
        request_timeout_secs: Option<u64>,
    },
    /// Print the effective configuration
    Show,
}
