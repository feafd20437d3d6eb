//! Credential persistence seam for the session gate.

use std::sync::{Arc, Mutex};

use crate::error::SyncResult;
use crate::models::Credential;
use crate::util::lock_unpoisoned;

/// Where the session gate keeps the bearer credential between runs.
///
/// Implementations must be cheap to call; the gate invokes them outside of
/// any await point.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> SyncResult<Option<Credential>>;
    fn save(&self, credential: &Credential) -> SyncResult<()>;
    fn clear(&self) -> SyncResult<()>;
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slot: Arc<Mutex<Option<Credential>>>,
}

impl MemoryCredentialStore {
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(credential))),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> SyncResult<Option<Credential>> {
        Ok(lock_unpoisoned(&self.slot).clone())
    }

    fn save(&self, credential: &Credential) -> SyncResult<()> {
        *lock_unpoisoned(&self.slot) = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> SyncResult<()> {
        lock_unpoisoned(&self.slot).take();
        Ok(())
    }
}
