//! reqwest implementation of the marketplace contract.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::MarketplaceApi;
use crate::config::{normalize_base_url, ClientConfig};
use crate::error::{SyncError, SyncResult};
use crate::models::{AuthGrant, Credential, LoginCredentials, ObjectId, Registration, User};
use crate::util::compact_text;

/// HTTP client for the marketplace API.
#[derive(Debug, Clone)]
pub struct HttpMarketplaceApi {
    base_url: String,
    client: Client,
}

impl HttpMarketplaceApi {
    /// Builds a client for an explicit API base URL.
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> SyncResult<Self> {
        let base_url = normalize_base_url(base_url.as_ref())?;
        let client = Client::builder().timeout(timeout).build().map_err(|error| {
            SyncError::InvalidConfiguration(format!("failed to construct HTTP client: {error}"))
        })?;
        Ok(Self { base_url, client })
    }

    pub fn from_config(config: &ClientConfig) -> SyncResult<Self> {
        Self::new(config.require_api_base_url()?, config.request_timeout())
    }

    /// Returns the base URL this client was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder, credential: &Credential) -> RequestBuilder {
        request
            .bearer_auth(credential.token())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> SyncResult<T> {
        let response = ensure_success(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl MarketplaceApi for HttpMarketplaceApi {
    async fn identity(&self, credential: &Credential) -> SyncResult<User> {
        let request = self.authorized(self.client.get(self.url("/identity")), credential);
        match Self::send_json::<IdentityPayload>(request).await? {
            IdentityPayload::Bare(user) | IdentityPayload::Wrapped { user: Some(user) } => Ok(user),
            IdentityPayload::Wrapped { user: None } => Err(SyncError::Unauthorized),
        }
    }

    async fn login(&self, credentials: &LoginCredentials) -> SyncResult<AuthGrant> {
        let request = self
            .client
            .post(self.url("/login"))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(credentials);
        let payload = Self::send_json::<AuthPayload>(request).await?;
        let grant = payload.into_grant();
        if grant.credential.is_none() {
            return Err(SyncError::Api {
                status: StatusCode::OK.as_u16(),
                message: "login response did not include a token".to_string(),
            });
        }
        Ok(grant)
    }

    async fn register(&self, registration: &Registration) -> SyncResult<AuthGrant> {
        let request = self
            .client
            .post(self.url("/register"))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(registration);
        Ok(Self::send_json::<AuthPayload>(request).await?.into_grant())
    }

    async fn logout(&self, credential: &Credential) -> SyncResult<()> {
        let request = self.authorized(self.client.post(self.url("/logout")), credential);
        let response = request.send().await?;
        // An already-invalid session is as logged out as it gets.
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }

    async fn notification_count(&self, credential: &Credential) -> SyncResult<u64> {
        let request =
            self.authorized(self.client.get(self.url("/notifications/count")), credential);
        Ok(Self::send_json::<NotificationCountPayload>(request).await?.total)
    }

    async fn toggle_favorite(
        &self,
        credential: &Credential,
        object_id: &ObjectId,
    ) -> SyncResult<bool> {
        let request = self
            .authorized(self.client.post(self.url("/favorites")), credential)
            .json(&serde_json::json!({ "objectId": object_id }));
        Ok(Self::send_json::<FavoritePayload>(request).await?.is_favorite)
    }

    async fn confirm_payment(
        &self,
        credential: &Credential,
        transaction_id: &str,
        session_id: &str,
    ) -> SyncResult<()> {
        let url = self.url(&format!(
            "/transactions/{}/confirm-payment",
            urlencoding::encode(transaction_id)
        ));
        let request = self
            .authorized(self.client.post(url), credential)
            .json(&serde_json::json!({ "sessionId": session_id }));
        ensure_success(request.send().await?).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(SyncError::Unauthorized);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SyncError::Api {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        });
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdentityPayload {
    Bare(User),
    Wrapped { user: Option<User> },
}

#[derive(Debug, Deserialize)]
struct AuthPayload {
    user: User,
    #[serde(default)]
    token: Option<String>,
}

impl AuthPayload {
    fn into_grant(self) -> AuthGrant {
        let credential = self
            .token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .map(Credential::new);
        AuthGrant {
            user: self.user,
            credential,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NotificationCountPayload {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct FavoritePayload {
    #[serde(rename = "isFavorite")]
    is_favorite: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Extract a human-readable message from a failed response body.
pub fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.error.or(payload.message) {
            let message = message.trim();
            if !message.is_empty() {
                return message.to_string();
            }
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed
    }
}
