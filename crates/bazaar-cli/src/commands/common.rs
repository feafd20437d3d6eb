use std::sync::Arc;

use bazaar_core::countdown::{format_remaining, CountdownState, Deadline};
use bazaar_core::{
    ClientConfig, ConfirmationStatus, ConfirmationTicket, HttpMarketplaceApi, MarketplaceApi,
    Navigator, Session, SessionGate, ToggleOutcome,
};
use serde::Serialize;

use crate::credentials::KeyringCredentialStore;
use crate::error::CliError;

/// Session-aware handles shared by the network commands.
pub struct Storefront {
    pub config: ClientConfig,
    pub api: Arc<dyn MarketplaceApi>,
    pub session: SessionGate,
}

/// Points the user back at `bazaar login` when the session ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate_to_entry(&self) {
        eprintln!("Signed out. Run `bazaar login` to sign in again.");
    }
}

/// Build the API client and resolve the stored session.
pub async fn open_storefront(config: ClientConfig) -> Result<Storefront, CliError> {
    let http = HttpMarketplaceApi::from_config(&config)?;
    let store = KeyringCredentialStore::for_api(http.base_url());
    let api: Arc<dyn MarketplaceApi> = Arc::new(http);
    let session = SessionGate::new(Arc::clone(&api), Arc::new(store), TerminalNavigator);
    session.check_auth().await;
    Ok(Storefront {
        config,
        api,
        session,
    })
}

#[derive(Debug, Serialize)]
pub struct StatusItem {
    pub api_base_url: Option<String>,
    pub signed_in: bool,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

pub fn status_item(session: &Session, api_base_url: Option<&str>) -> StatusItem {
    let user = session.user();
    StatusItem {
        api_base_url: api_base_url.map(str::to_string),
        signed_in: session.is_authenticated(),
        user_id: user.map(|user| user.id.clone()),
        email: user.map(|user| user.email.clone()),
        name: user.and_then(|user| user.name.clone()),
    }
}

pub fn format_status_line(session: &Session) -> String {
    session.user().map_or_else(
        || "Not signed in.".to_string(),
        |user| format!("Signed in as {} <{}>", user.label(), user.email),
    )
}

pub fn parse_deadline(raw: &str) -> Result<Deadline, CliError> {
    raw.parse::<Deadline>()
        .map_err(|_| CliError::InvalidDeadline(raw.trim().to_string()))
}

pub fn format_countdown_line(state: &CountdownState) -> String {
    if state.urgent && !state.expired {
        format!("{} (ending soon)", format_remaining(state))
    } else {
        format_remaining(state)
    }
}

pub fn format_toggle_outcome(outcome: &ToggleOutcome) -> String {
    let verb = if outcome.is_favorite {
        "Added"
    } else {
        "Removed"
    };
    let mut line = format!("{verb} {} {} favorites", outcome.object_id, preposition(outcome));
    if outcome.conflicted {
        line.push_str(" (updated to match the server)");
    }
    line
}

const fn preposition(outcome: &ToggleOutcome) -> &'static str {
    if outcome.is_favorite {
        "to"
    } else {
        "from"
    }
}

#[derive(Debug, Serialize)]
pub struct ConfirmationItem {
    pub transaction_id: String,
    pub session_id: Option<String>,
    pub status: String,
    pub failure: Option<String>,
}

pub fn confirmation_item(transaction_id: &str, ticket: &ConfirmationTicket) -> ConfirmationItem {
    ConfirmationItem {
        transaction_id: transaction_id.to_string(),
        session_id: ticket.session_id.clone(),
        status: ticket.status.to_string(),
        failure: ticket.failure.clone(),
    }
}

pub fn format_confirmation_lines(transaction_id: &str, ticket: &ConfirmationTicket) -> Vec<String> {
    match ticket.status {
        ConfirmationStatus::Confirmed => vec![format!("Payment confirmed for {transaction_id}")],
        ConfirmationStatus::Pending => {
            vec![format!("Payment for {transaction_id} is still pending")]
        }
        ConfirmationStatus::Unconfirmed => vec![
            format!("Payment for {transaction_id} could not be confirmed"),
            format!(
                "Reason: {}",
                ticket.failure.as_deref().unwrap_or("unknown error")
            ),
            "Check the transaction in your dashboard or contact support before paying again."
                .to_string(),
        ],
    }
}
