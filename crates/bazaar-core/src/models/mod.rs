//! Data models for Bazaar

mod listing;
mod user;

pub use listing::ObjectId;
pub use user::{AuthGrant, Credential, LoginCredentials, Registration, User};
