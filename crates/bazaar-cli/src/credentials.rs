//! Keychain persistence for the storefront bearer credential.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

use bazaar_core::error::{SyncError, SyncResult};
use bazaar_core::{Credential, CredentialStore};
#[cfg(not(test))]
use keyring::Entry;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "bazaar-cli";

/// One keychain entry per API host, so staging and production sessions coexist.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    username: String,
}

impl KeyringCredentialStore {
    pub fn for_api(base_url: &str) -> Self {
        Self {
            username: format!("session:{}", keychain_account(base_url)),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> SyncResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| SyncError::CredentialStorage(error.to_string()))
    }
}

/// Host part of the API URL, without scheme or path.
pub fn keychain_account(base_url: &str) -> String {
    let without_scheme = base_url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_ascii_lowercase()
}

impl CredentialStore for KeyringCredentialStore {
    #[cfg(not(test))]
    fn load(&self) -> SyncResult<Option<Credential>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(SyncError::CredentialStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load(&self) -> SyncResult<Option<Credential>> {
        let store = Self::test_store();
        let guard = store
            .lock()
            .map_err(|error| SyncError::CredentialStorage(error.to_string()))?;
        if let Some(raw) = guard.get(&self.username) {
            Ok(Some(serde_json::from_str(raw)?))
        } else {
            Ok(None)
        }
    }

    #[cfg(not(test))]
    fn save(&self, credential: &Credential) -> SyncResult<()> {
        let raw = serde_json::to_string(credential)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| SyncError::CredentialStorage(error.to_string()))?;
        Ok(())
    }

    #[cfg(test)]
    fn save(&self, credential: &Credential) -> SyncResult<()> {
        let raw = serde_json::to_string(credential)?;
        let store = Self::test_store();
        let mut guard = store
            .lock()
            .map_err(|error| SyncError::CredentialStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear(&self) -> SyncResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(SyncError::CredentialStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear(&self) -> SyncResult<()> {
        let store = Self::test_store();
        let mut guard = store
            .lock()
            .map_err(|error| SyncError::CredentialStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}
