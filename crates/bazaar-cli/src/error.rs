use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] bazaar_core::SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid deadline '{0}': expected an RFC 3339 timestamp")]
    InvalidDeadline(String),
    #[error("Listing ID cannot be empty")]
    EmptyObjectId,
    #[error("Transaction ID cannot be empty")]
    EmptyTransactionId,
    #[error("Payment could not be confirmed: {0}")]
    PaymentUnconfirmed(String),
}
