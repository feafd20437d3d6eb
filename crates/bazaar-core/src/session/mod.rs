//! Session gate: the single authority for authenticated identity.
//!
//! Every other component receives a [`SessionGate`] clone and calls
//! [`SessionGate::authorize`] before issuing a network request. Only the gate's
//! own operations (`check_auth`, `login`, `register`, `logout`, and
//! `handle_unauthorized`) write the session; consumers observe it through
//! snapshots or a watch subscription.
//!
//! Operations are not serialized against each other. Two overlapping calls race
//! and the last one to finish decides `Session::user`.

mod store;

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::api::MarketplaceApi;
use crate::error::{SyncError, SyncResult};
use crate::models::{Credential, LoginCredentials, Registration, User};
use crate::util::lock_unpoisoned;

pub use store::{CredentialStore, MemoryCredentialStore};

/// Coarse lifecycle derived from a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Authenticated,
    Anonymous,
}

/// Read-only view of the process-wide session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: Option<User>,
    loading: bool,
}

impl Session {
    const fn starting() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// True while any gate operation is in flight.
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub const fn phase(&self) -> SessionPhase {
        if self.loading {
            SessionPhase::Loading
        } else if self.user.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Anonymous
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    SignedIn(User),
    /// Account created; the user must verify their email before signing in.
    VerificationPending { email: String },
}

/// Sends the user back to the storefront entry point.
pub trait Navigator: Send + Sync {
    fn navigate_to_entry(&self);
}

impl<F> Navigator for F
where
    F: Fn() + Send + Sync,
{
    fn navigate_to_entry(&self) {
        self();
    }
}

/// Navigator for shells without routing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate_to_entry(&self) {}
}

struct GateInner {
    api: Arc<dyn MarketplaceApi>,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    credential: Mutex<Option<Credential>>,
    session: watch::Sender<Session>,
    in_flight: Mutex<usize>,
}

/// Keeps `Session::loading` raised while an operation runs.
struct LoadingGuard<'a> {
    inner: &'a GateInner,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = lock_unpoisoned(&self.inner.in_flight);
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.inner.session.send_modify(|session| session.loading = false);
        }
    }
}

/// Cheaply cloneable handle to the process-wide session.
#[derive(Clone)]
pub struct SessionGate {
    inner: Arc<GateInner>,
}

impl SessionGate {
    /// Create a gate in the `loading` state. Call [`check_auth`](Self::check_auth)
    /// once at startup to resolve it.
    pub fn new(
        api: Arc<dyn MarketplaceApi>,
        store: Arc<dyn CredentialStore>,
        navigator: impl Navigator + 'static,
    ) -> Self {
        let (session, _) = watch::channel(Session::starting());
        Self {
            inner: Arc::new(GateInner {
                api,
                store,
                navigator: Arc::new(navigator),
                credential: Mutex::new(None),
                session,
                in_flight: Mutex::new(0),
            }),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.inner.session.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.session.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.session.borrow().user.clone()
    }

    /// Credential for an authorized call, or `Unauthorized` when anonymous.
    pub fn authorize(&self) -> SyncResult<Credential> {
        lock_unpoisoned(&self.inner.credential)
            .clone()
            .ok_or(SyncError::Unauthorized)
    }

    /// Resolve the startup identity from the stored credential.
    ///
    /// Any failure, including an unverified identity, leaves the session
    /// anonymous and clears the stored credential.
    pub async fn check_auth(&self) -> Option<User> {
        let _loading = self.begin_loading();

        let credential = match self.authorize() {
            Ok(credential) => Some(credential),
            Err(_) => self.inner.store.load().unwrap_or_else(|error| {
                tracing::warn!("Failed to load stored credential: {}", error);
                None
            }),
        };
        let Some(credential) = credential else {
            tracing::debug!("No stored credential; session is anonymous");
            self.clear_local();
            return None;
        };

        match self.inner.api.identity(&credential).await {
            Ok(user) if user.verified => {
                tracing::info!("Session restored for {}", user.id);
                self.set_authenticated(user.clone(), credential, false);
                Some(user)
            }
            Ok(user) => {
                tracing::warn!("Stored session belongs to unverified account {}", user.id);
                self.clear_local();
                None
            }
            Err(error) => {
                tracing::info!("Identity check failed, continuing anonymously: {}", error);
                self.clear_local();
                None
            }
        }
    }

    /// Sign in. An unverified account's freshly minted session is revoked
    /// before this returns `VerificationRequired`, and the local session is
    /// left anonymous.
    pub async fn login(&self, credentials: &LoginCredentials) -> SyncResult<User> {
        let _loading = self.begin_loading();
        credentials.validate()?;

        let grant = self
            .inner
            .api
            .login(credentials)
            .await
            .map_err(rejected_credentials)?;
        let credential = grant.credential.ok_or_else(|| SyncError::Api {
            status: 200,
            message: "login response did not include a token".to_string(),
        })?;

        if !grant.user.verified {
            self.revoke(&credential).await;
            return Err(SyncError::VerificationRequired);
        }

        tracing::info!("Signed in as {}", grant.user.id);
        self.set_authenticated(grant.user.clone(), credential, true);
        Ok(grant.user)
    }

    /// Create an account. Only a verified account with an issued credential
    /// signs in immediately.
    pub async fn register(&self, registration: &Registration) -> SyncResult<RegisterOutcome> {
        let _loading = self.begin_loading();
        registration.validate()?;

        let grant = self.inner.api.register(registration).await?;
        match grant.credential {
            Some(credential) if grant.user.verified => {
                tracing::info!("Registered and signed in as {}", grant.user.id);
                self.set_authenticated(grant.user.clone(), credential, true);
                Ok(RegisterOutcome::SignedIn(grant.user))
            }
            Some(credential) => {
                self.revoke(&credential).await;
                Ok(RegisterOutcome::VerificationPending {
                    email: grant.user.email,
                })
            }
            None => Ok(RegisterOutcome::VerificationPending {
                email: grant.user.email,
            }),
        }
    }

    /// Invalidate the remote session, clear local state, and navigate to the
    /// entry point. Local state is cleared even when the remote call fails.
    pub async fn logout(&self) {
        let _loading = self.begin_loading();

        if let Ok(credential) = self.authorize() {
            if let Err(error) = self.inner.api.logout(&credential).await {
                tracing::warn!("Remote logout failed, clearing local session anyway: {}", error);
            }
        }
        self.clear_local();
        tracing::info!("Signed out");
        self.inner.navigator.navigate_to_entry();
    }

    /// Report a `401` received with `credential`.
    ///
    /// Ignored when the session has since moved on to another credential.
    /// Returns whether the session was cleared.
    pub fn handle_unauthorized(&self, credential: &Credential) -> bool {
        let mut current = lock_unpoisoned(&self.inner.credential);
        if current.as_ref() != Some(credential) {
            return false;
        }
        self.forget(&mut current);
        drop(current);

        tracing::info!("Session expired; continuing anonymously");
        self.inner.navigator.navigate_to_entry();
        true
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        let mut in_flight = lock_unpoisoned(&self.inner.in_flight);
        *in_flight += 1;
        self.inner.session.send_modify(|session| session.loading = true);
        LoadingGuard { inner: &self.inner }
    }

    /// Adopt `credential`, writing it to the store first when `persist` is set.
    /// Both happen under the credential lock so a concurrent stale `401`
    /// cannot clear the new entry.
    fn set_authenticated(&self, user: User, credential: Credential, persist: bool) {
        let mut current = lock_unpoisoned(&self.inner.credential);
        if persist {
            self.persist(&credential);
        }
        *current = Some(credential);
        self.inner.session.send_modify(|session| session.user = Some(user));
    }

    fn clear_local(&self) {
        let mut current = lock_unpoisoned(&self.inner.credential);
        self.forget(&mut current);
    }

    /// Drop the held credential. Callers hold the credential lock.
    fn forget(&self, current: &mut Option<Credential>) {
        current.take();
        if let Err(error) = self.inner.store.clear() {
            tracing::warn!("Failed to clear stored credential: {}", error);
        }
        self.inner.session.send_modify(|session| session.user = None);
    }

    fn persist(&self, credential: &Credential) {
        if let Err(error) = self.inner.store.save(credential) {
            tracing::warn!("Failed to persist credential: {}", error);
        }
    }

    /// Revoke a credential minted for an unverified account.
    async fn revoke(&self, credential: &Credential) {
        if let Err(error) = self.inner.api.logout(credential).await {
            tracing::warn!("Failed to revoke unverified session: {}", error);
        }
        self.clear_local();
    }
}

/// A 401 from `/login` means bad credentials, not an expired session.
fn rejected_credentials(error: SyncError) -> SyncError {
    match error {
        SyncError::Unauthorized => SyncError::Api {
            status: 401,
            message: "Invalid email or password".to_string(),
        },
        other => other,
    }
}
