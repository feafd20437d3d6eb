//! Post-checkout payment confirmation, issued at most once per checkout session.
//!
//! The first [`ConfirmationFlow::mount`] for a `sessionId` spawns the
//! confirmation request on its own task and records a watch channel for it.
//! Every mount for that id, concurrent or later, awaits the same channel, so
//! the request is sent once even when a mounting view goes away mid-flight.
//! A failed confirmation is terminal; the caller offers the user a manual
//! fallback instead of retrying.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::api::MarketplaceApi;
use crate::error::SyncError;
use crate::session::SessionGate;
use crate::util::{lock_unpoisoned, normalize_text_option};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Unconfirmed,
}

impl ConfirmationStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Unconfirmed => "unconfirmed",
        })
    }
}

/// Confirmation state for one checkout return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationTicket {
    /// `None` when the page was reached without a checkout session.
    pub session_id: Option<String>,
    pub status: ConfirmationStatus,
    /// Why confirmation failed, for the manual fallback prompt.
    pub failure: Option<String>,
}

impl ConfirmationTicket {
    const fn pending(session_id: String) -> Self {
        Self {
            session_id: Some(session_id),
            status: ConfirmationStatus::Pending,
            failure: None,
        }
    }

    const fn direct_access() -> Self {
        Self {
            session_id: None,
            status: ConfirmationStatus::Confirmed,
            failure: None,
        }
    }

    fn unconfirmed(session_id: Option<String>, error: &SyncError) -> Self {
        Self {
            session_id,
            status: ConfirmationStatus::Unconfirmed,
            failure: Some(error.to_string()),
        }
    }

    pub const fn is_confirmed(&self) -> bool {
        matches!(self.status, ConfirmationStatus::Confirmed)
    }
}

struct FlowInner {
    api: Arc<dyn MarketplaceApi>,
    session: SessionGate,
    tickets: Mutex<HashMap<String, watch::Receiver<ConfirmationTicket>>>,
}

/// Memoized confirmation requests keyed by checkout `sessionId`.
#[derive(Clone)]
pub struct ConfirmationFlow {
    inner: Arc<FlowInner>,
}

impl ConfirmationFlow {
    pub fn new(api: Arc<dyn MarketplaceApi>, session: SessionGate) -> Self {
        Self {
            inner: Arc::new(FlowInner {
                api,
                session,
                tickets: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Resolve the confirmation for `transaction_id`, issuing the request on
    /// the first mount for `session_id` only.
    ///
    /// Without a `session_id` the ticket is confirmed immediately. An anonymous
    /// session yields `Unconfirmed` without a request and without memoizing,
    /// so mounting again after signing in still confirms.
    pub async fn mount(
        &self,
        transaction_id: &str,
        session_id: Option<&str>,
    ) -> ConfirmationTicket {
        let Some(session_id) = normalize_text_option(session_id.map(str::to_string)) else {
            tracing::debug!("No checkout session for {}; treating as confirmed", transaction_id);
            return ConfirmationTicket::direct_access();
        };

        let mut receiver = match self.ticket_receiver(transaction_id, &session_id) {
            Ok(receiver) => receiver,
            Err(error) => return ConfirmationTicket::unconfirmed(Some(session_id), &error),
        };

        let settled = receiver
            .wait_for(|ticket| ticket.status.is_terminal())
            .await
            .map(|ticket| ticket.clone());
        settled.unwrap_or_else(|_| {
            ConfirmationTicket::unconfirmed(
                Some(session_id),
                &SyncError::Network("confirmation was interrupted".to_string()),
            )
        })
    }

    /// Current ticket for a session id that has been mounted before.
    pub fn status(&self, session_id: &str) -> Option<ConfirmationTicket> {
        lock_unpoisoned(&self.inner.tickets)
            .get(session_id.trim())
            .map(|receiver| receiver.borrow().clone())
    }

    fn ticket_receiver(
        &self,
        transaction_id: &str,
        session_id: &str,
    ) -> Result<watch::Receiver<ConfirmationTicket>, SyncError> {
        let mut tickets = lock_unpoisoned(&self.inner.tickets);
        if let Some(receiver) = tickets.get(session_id) {
            tracing::debug!("Reusing confirmation for checkout session {}", session_id);
            return Ok(receiver.clone());
        }

        let credential = self.inner.session.authorize()?;
        let (sender, receiver) =
            watch::channel(ConfirmationTicket::pending(session_id.to_string()));
        tickets.insert(session_id.to_string(), receiver.clone());
        drop(tickets);

        let inner = Arc::clone(&self.inner);
        let transaction_id = transaction_id.to_string();
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            let result = inner
                .api
                .confirm_payment(&credential, &transaction_id, &session_id)
                .await;
            let ticket = match result {
                Ok(()) => {
                    tracing::info!("Payment confirmed for transaction {}", transaction_id);
                    confirmed(session_id)
                }
                Err(SyncError::Api { status: 409, .. }) => {
                    tracing::info!("Transaction {} was already confirmed", transaction_id);
                    confirmed(session_id)
                }
                Err(error) => {
                    tracing::warn!(
                        "Payment confirmation failed for transaction {}: {}",
                        transaction_id,
                        error
                    );
                    if matches!(error, SyncError::Unauthorized) {
                        inner.session.handle_unauthorized(&credential);
                    }
                    ConfirmationTicket::unconfirmed(Some(session_id), &error)
                }
            };
            sender.send_replace(ticket);
        });

        Ok(receiver)
    }
}

const fn confirmed(session_id: String) -> ConfirmationTicket {
    ConfirmationTicket {
        session_id: Some(session_id),
        status: ConfirmationStatus::Confirmed,
        failure: None,
    }
}
