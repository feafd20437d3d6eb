//! Identity models shared by the session gate and the API client

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// A marketplace account as returned by `GET /identity` and `POST /login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Whether the account's email address has been verified
    #[serde(rename = "_verified", default)]
    pub verified: bool,
}

impl User {
    /// Display label, preferring the account name over the email.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// Bearer credential issued by the marketplace API on login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Email/password pair submitted to `POST /login`.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }

    pub(crate) fn validate(&self) -> SyncResult<()> {
        validate_credentials(&self.email, &self.password)
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// New account submitted to `POST /register`.
#[derive(Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Registration {
    pub(crate) fn validate(&self) -> SyncResult<()> {
        validate_credentials(&self.email, &self.password)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Registration")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("name", &self.name)
            .finish()
    }
}

/// Identity plus (optionally) the credential minted alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub user: User,
    pub credential: Option<Credential>,
}

fn validate_credentials(email: &str, password: &str) -> SyncResult<()> {
    if email.trim().is_empty() {
        return Err(SyncError::Validation("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(SyncError::Validation("Password is required".to_string()));
    }
    Ok(())
}
