//! Error types for bazaar-core

use thiserror::Error;

/// Result type alias using bazaar-core's error
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors raised while synchronizing client state with the marketplace API
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport failure; the request may or may not have reached the server
    #[error("Network request failed: {0}")]
    Network(String),

    /// No active session, or the server rejected the credential
    #[error("Not signed in or session expired")]
    Unauthorized,

    /// Login succeeded for an account whose email is not verified yet
    #[error("Email address must be verified before signing in")]
    VerificationRequired,

    /// A favorite update for the same object is still awaiting the server
    #[error("A favorite update for {0} is already in progress")]
    ToggleInFlight(String),

    /// Non-success response carrying an `{ error }` body
    #[error("API error: {message} ({status})")]
    Api { status: u16, message: String },

    /// Serialization error
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// User input rejected before reaching the server
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Keychain or other credential persistence failure
    #[error("Credential storage error: {0}")]
    CredentialStorage(String),
}

impl SyncError {
    /// Whether the failure is worth retrying on a later schedule.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
            || matches!(self, Self::Api { status, .. } if *status >= 500)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Api {
                status: error.status().map_or(200, |status| status.as_u16()),
                message: format!("unexpected response body: {error}"),
            }
        } else {
            Self::Network(error.to_string())
        }
    }
}
