//! Remote marketplace contract consumed by the synchronization layer.
//!
//! Everything the core needs from the CMS/API server is expressed through
//! [`MarketplaceApi`]. [`HttpMarketplaceApi`] is the production implementation;
//! components take an `Arc<dyn MarketplaceApi>` so tests can script responses.

mod http;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::models::{AuthGrant, Credential, LoginCredentials, ObjectId, Registration, User};

pub use http::{parse_api_error, HttpMarketplaceApi};

#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// `GET /identity`
    async fn identity(&self, credential: &Credential) -> SyncResult<User>;

    /// `POST /login`
    async fn login(&self, credentials: &LoginCredentials) -> SyncResult<AuthGrant>;

    /// `POST /register`
    async fn register(&self, registration: &Registration) -> SyncResult<AuthGrant>;

    /// `POST /logout`
    async fn logout(&self, credential: &Credential) -> SyncResult<()>;

    /// `GET /notifications/count`
    async fn notification_count(&self, credential: &Credential) -> SyncResult<u64>;

    /// `POST /favorites`; returns the authoritative membership after the toggle.
    async fn toggle_favorite(
        &self,
        credential: &Credential,
        object_id: &ObjectId,
    ) -> SyncResult<bool>;

    /// `POST /transactions/{id}/confirm-payment`
    async fn confirm_payment(
        &self,
        credential: &Credential,
        transaction_id: &str,
        session_id: &str,
    ) -> SyncResult<()>;
}
