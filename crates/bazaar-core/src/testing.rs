//! Scripted marketplace API for component tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::api::MarketplaceApi;
use crate::error::{SyncError, SyncResult};
use crate::models::{AuthGrant, Credential, LoginCredentials, ObjectId, Registration, User};
use crate::session::{MemoryCredentialStore, NoopNavigator, SessionGate};

pub fn verified_user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        name: None,
        verified: true,
    }
}

pub fn unverified_user(id: &str) -> User {
    User {
        verified: false,
        ..verified_user(id)
    }
}

pub fn grant(user: User, token: Option<&str>) -> AuthGrant {
    AuthGrant {
        user,
        credential: token.map(Credential::new),
    }
}

/// Gate already resolved to an authenticated session for `buyer`.
pub async fn signed_in_gate(api: &Arc<FakeApi>) -> SessionGate {
    api.set_identity(Some(verified_user("buyer")));
    let store = MemoryCredentialStore::with_credential(Credential::new("buyer-token"));
    let gate = SessionGate::new(api.clone(), Arc::new(store), NoopNavigator);
    gate.check_auth().await;
    gate
}

/// Gate resolved to an anonymous session.
pub async fn anonymous_gate(api: &Arc<FakeApi>) -> SessionGate {
    let gate = SessionGate::new(
        api.clone(),
        Arc::new(MemoryCredentialStore::default()),
        NoopNavigator,
    );
    gate.check_auth().await;
    gate
}

/// In-memory [`MarketplaceApi`] with per-endpoint scripted results.
///
/// Unscripted identity/login/register calls answer `Unauthorized`; unscripted
/// queue-backed calls fall back to a benign default.
#[derive(Default)]
pub struct FakeApi {
    identity: Mutex<Option<User>>,
    login: Mutex<Option<AuthGrant>>,
    register: Mutex<Option<AuthGrant>>,
    logout_fails: AtomicBool,
    notifications: Mutex<VecDeque<SyncResult<u64>>>,
    favorites: Mutex<VecDeque<SyncResult<bool>>>,
    confirmations: Mutex<VecDeque<SyncResult<()>>>,
    delay: Mutex<Duration>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_identity(&self, user: Option<User>) {
        *self.identity.lock().unwrap() = user;
    }

    pub fn set_login(&self, grant: Option<AuthGrant>) {
        *self.login.lock().unwrap() = grant;
    }

    pub fn set_register(&self, grant: Option<AuthGrant>) {
        *self.register.lock().unwrap() = grant;
    }

    pub fn fail_logout(&self) {
        self.logout_fails.store(true, Ordering::SeqCst);
    }

    pub fn push_favorite(&self, result: SyncResult<bool>) {
        self.favorites.lock().unwrap().push_back(result);
    }

    pub fn push_confirmation(&self, result: SyncResult<()>) {
        self.confirmations.lock().unwrap().push_back(result);
    }

    pub fn push_notification(&self, result: SyncResult<u64>) {
        self.notifications.lock().unwrap().push_back(result);
    }

    /// Latency applied to every call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    async fn enter(&self, endpoint: &'static str) {
        *self.calls.lock().unwrap().entry(endpoint).or_insert(0) += 1;
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MarketplaceApi for FakeApi {
    async fn identity(&self, _credential: &Credential) -> SyncResult<User> {
        self.enter("identity").await;
        self.identity
            .lock()
            .unwrap()
            .clone()
            .ok_or(SyncError::Unauthorized)
    }

    async fn login(&self, _credentials: &LoginCredentials) -> SyncResult<AuthGrant> {
        self.enter("login").await;
        self.login
            .lock()
            .unwrap()
            .clone()
            .ok_or(SyncError::Unauthorized)
    }

    async fn register(&self, _registration: &Registration) -> SyncResult<AuthGrant> {
        self.enter("register").await;
        self.register
            .lock()
            .unwrap()
            .clone()
            .ok_or(SyncError::Unauthorized)
    }

    async fn logout(&self, _credential: &Credential) -> SyncResult<()> {
        self.enter("logout").await;
        if self.logout_fails.load(Ordering::SeqCst) {
            return Err(SyncError::Network("logout endpoint unreachable".to_string()));
        }
        Ok(())
    }

    async fn notification_count(&self, _credential: &Credential) -> SyncResult<u64> {
        self.enter("notification_count").await;
        self.notifications
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(0))
    }

    async fn toggle_favorite(
        &self,
        _credential: &Credential,
        _object_id: &ObjectId,
    ) -> SyncResult<bool> {
        self.enter("toggle_favorite").await;
        self.favorites
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Network("unscripted favorite call".to_string())))
    }

    async fn confirm_payment(
        &self,
        _credential: &Credential,
        _transaction_id: &str,
        _session_id: &str,
    ) -> SyncResult<()> {
        self.enter("confirm_payment").await;
        self.confirmations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}
