//! bazaar-core - Real-time state synchronization for the Bazaar storefront
//!
//! This crate holds the client-side components that keep view state converged
//! with the marketplace API: auction countdowns, polling loops, optimistic
//! favorites, idempotent payment confirmation, and the session gate they all
//! consult before talking to the server.

pub mod api;
pub mod config;
pub mod confirmation;
pub mod countdown;
pub mod error;
pub mod favorites;
pub mod models;
pub mod notifications;
pub mod polling;
pub mod session;
pub mod util;

#[cfg(test)]
mod testing;

pub use api::{HttpMarketplaceApi, MarketplaceApi};
pub use config::ClientConfig;
pub use confirmation::{ConfirmationFlow, ConfirmationStatus, ConfirmationTicket};
pub use countdown::{spawn_countdown, CountdownEngine, CountdownHandle, CountdownState, Deadline};
pub use error::{SyncError, SyncResult};
pub use favorites::{FavoriteEntry, FavoriteStore, ToggleOutcome};
pub use models::{Credential, LoginCredentials, ObjectId, Registration, User};
pub use notifications::NotificationCounter;
pub use polling::{spawn_poller, PollHandle, PollSnapshot};
pub use session::{
    CredentialStore, MemoryCredentialStore, Navigator, NoopNavigator, RegisterOutcome, Session,
    SessionGate, SessionPhase,
};
