//! Optimistic favorite membership.
//!
//! Each object id moves through `Clean -> Pending -> {Reconciled, RolledBack}`.
//! While an id is `Pending` a second toggle for it is rejected with
//! [`SyncError::ToggleInFlight`]; toggles for other ids proceed independently.
//! The server's `isFavorite` answer always wins over the optimistic guess.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::api::MarketplaceApi;
use crate::error::{SyncError, SyncResult};
use crate::models::ObjectId;
use crate::session::SessionGate;
use crate::util::lock_unpoisoned;

/// Local view of one object's membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteEntry {
    /// Seeded from a server listing, untouched since.
    Clean { member: bool },
    /// Request in flight; `optimistic` is what the UI currently shows.
    Pending { previous: bool, optimistic: bool },
    /// Server answered; `conflicted` when it disagreed with the guess.
    Reconciled { member: bool, conflicted: bool },
    /// Request failed or was abandoned; membership restored.
    RolledBack { member: bool },
}

impl FavoriteEntry {
    pub const fn is_member(self) -> bool {
        match self {
            Self::Clean { member }
            | Self::Reconciled { member, .. }
            | Self::RolledBack { member } => member,
            Self::Pending { optimistic, .. } => optimistic,
        }
    }

    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// Result of a completed toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub object_id: ObjectId,
    /// Membership as reported by the server.
    pub is_favorite: bool,
    /// The server disagreed with the optimistic guess and local state was corrected.
    pub conflicted: bool,
}

struct FavoriteInner {
    api: Arc<dyn MarketplaceApi>,
    session: SessionGate,
    entries: Mutex<HashMap<ObjectId, FavoriteEntry>>,
    members: watch::Sender<BTreeSet<ObjectId>>,
}

impl FavoriteInner {
    /// Flip membership locally and mark the id pending. Returns the guess.
    fn begin(&self, id: &ObjectId) -> SyncResult<bool> {
        let mut entries = lock_unpoisoned(&self.entries);
        let current = entries
            .get(id)
            .copied()
            .unwrap_or(FavoriteEntry::Clean { member: false });
        if current.is_pending() {
            return Err(SyncError::ToggleInFlight(id.to_string()));
        }

        let previous = current.is_member();
        let optimistic = !previous;
        entries.insert(
            id.clone(),
            FavoriteEntry::Pending {
                previous,
                optimistic,
            },
        );
        self.publish(&entries);
        Ok(optimistic)
    }

    fn settle(&self, id: &ObjectId, entry: FavoriteEntry) {
        let mut entries = lock_unpoisoned(&self.entries);
        entries.insert(id.clone(), entry);
        self.publish(&entries);
    }

    fn roll_back(&self, id: &ObjectId) {
        let mut entries = lock_unpoisoned(&self.entries);
        if let Some(FavoriteEntry::Pending { previous, .. }) = entries.get(id).copied() {
            entries.insert(id.clone(), FavoriteEntry::RolledBack { member: previous });
            self.publish(&entries);
        }
    }

    fn publish(&self, entries: &HashMap<ObjectId, FavoriteEntry>) {
        let members: BTreeSet<ObjectId> = entries
            .iter()
            .filter(|(_, entry)| entry.is_member())
            .map(|(id, _)| id.clone())
            .collect();
        self.members.send_if_modified(|current| {
            if *current == members {
                false
            } else {
                *current = members;
                true
            }
        });
    }
}

/// Rolls the entry back if the toggle future is dropped before the server answers.
struct PendingToggle<'a> {
    inner: &'a FavoriteInner,
    id: Option<ObjectId>,
}

impl PendingToggle<'_> {
    fn settle(mut self, entry: FavoriteEntry) {
        if let Some(id) = self.id.take() {
            self.inner.settle(&id, entry);
        }
    }

    fn roll_back(mut self) {
        if let Some(id) = self.id.take() {
            self.inner.roll_back(&id);
        }
    }
}

impl Drop for PendingToggle<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            tracing::debug!("Favorite toggle for {} abandoned, rolling back", id);
            self.inner.roll_back(&id);
        }
    }
}

/// Favorite set shared by every view of the storefront.
#[derive(Clone)]
pub struct FavoriteStore {
    inner: Arc<FavoriteInner>,
}

impl FavoriteStore {
    pub fn new(api: Arc<dyn MarketplaceApi>, session: SessionGate) -> Self {
        let (members, _) = watch::channel(BTreeSet::new());
        Self {
            inner: Arc::new(FavoriteInner {
                api,
                session,
                entries: Mutex::new(HashMap::new()),
                members,
            }),
        }
    }

    /// Seed membership from a server listing.
    ///
    /// Ids not in `ids` become non-members. Entries with a request in flight
    /// are left alone; their own response decides them.
    pub fn hydrate<I>(&self, ids: I)
    where
        I: IntoIterator<Item = ObjectId>,
    {
        let listed: BTreeSet<ObjectId> = ids.into_iter().collect();
        let mut entries = lock_unpoisoned(&self.inner.entries);
        entries.retain(|id, entry| entry.is_pending() || listed.contains(id));
        for id in listed {
            let pending = entries.get(&id).is_some_and(|entry| entry.is_pending());
            if !pending {
                entries.insert(id, FavoriteEntry::Clean { member: true });
            }
        }
        self.inner.publish(&entries);
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.state(id).is_some_and(FavoriteEntry::is_member)
    }

    pub fn state(&self, id: &ObjectId) -> Option<FavoriteEntry> {
        lock_unpoisoned(&self.inner.entries).get(id).copied()
    }

    pub fn members(&self) -> BTreeSet<ObjectId> {
        self.inner.members.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BTreeSet<ObjectId>> {
        self.inner.members.subscribe()
    }

    /// Flip membership of `id` now and confirm it with the server.
    ///
    /// On failure the previous membership is restored and the error returned.
    /// A `401` also signs the session out.
    pub async fn toggle(&self, id: &ObjectId) -> SyncResult<ToggleOutcome> {
        let credential = self.inner.session.authorize()?;
        let optimistic = self.inner.begin(id)?;
        let pending = PendingToggle {
            inner: &self.inner,
            id: Some(id.clone()),
        };

        match self.inner.api.toggle_favorite(&credential, id).await {
            Ok(is_favorite) => {
                let conflicted = is_favorite != optimistic;
                if conflicted {
                    tracing::info!(
                        "Favorite {} reconciled to server state (expected {}, got {})",
                        id,
                        optimistic,
                        is_favorite
                    );
                } else {
                    tracing::debug!("Favorite {} confirmed as {}", id, is_favorite);
                }
                pending.settle(FavoriteEntry::Reconciled {
                    member: is_favorite,
                    conflicted,
                });
                Ok(ToggleOutcome {
                    object_id: id.clone(),
                    is_favorite,
                    conflicted,
                })
            }
            Err(error) => {
                tracing::warn!("Favorite toggle for {} failed, rolling back: {}", id, error);
                pending.roll_back();
                if matches!(error, SyncError::Unauthorized) {
                    self.inner.session.handle_unauthorized(&credential);
                }
                Err(error)
            }
        }
    }
}
