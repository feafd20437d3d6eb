//! Unread-notification badge backed by the polling client.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::api::MarketplaceApi;
use crate::error::SyncError;
use crate::polling::{spawn_poller, PollHandle, PollSnapshot};
use crate::session::SessionGate;

/// Polls `GET /notifications/count` until stopped or dropped.
pub struct NotificationCounter {
    handle: PollHandle<u64>,
}

impl NotificationCounter {
    /// Start polling immediately, then every `interval`.
    ///
    /// Ticks while signed out fail locally without a request. A `401` signs
    /// the session out.
    pub fn start(api: Arc<dyn MarketplaceApi>, session: SessionGate, interval: Duration) -> Self {
        let handle = spawn_poller("notifications", interval, move || {
            let api = Arc::clone(&api);
            let session = session.clone();
            async move {
                let credential = session.authorize()?;
                let result = api.notification_count(&credential).await;
                if matches!(result, Err(SyncError::Unauthorized)) {
                    session.handle_unauthorized(&credential);
                }
                result
            }
        });
        Self { handle }
    }

    /// Last known unread total; `0` before the first successful poll.
    pub fn count(&self) -> u64 {
        self.handle.latest().unwrap_or(0)
    }

    pub fn snapshot(&self) -> PollSnapshot<u64> {
        self.handle.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot<u64>> {
        self.handle.subscribe()
    }

    pub async fn changed(&mut self) -> Option<PollSnapshot<u64>> {
        self.handle.changed().await
    }

    pub fn stop(&self) {
        self.handle.stop();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::{anonymous_gate, signed_in_gate, FakeApi};

    fn offline() -> Result<u64, SyncError> {
        Err(SyncError::Network("connection reset".to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_three_failed_polls() {
        let api = FakeApi::new();
        let session = signed_in_gate(&api).await;
        for _ in 0..3 {
            api.push_notification(offline());
        }
        api.push_notification(Ok(5));

        let counter =
            NotificationCounter::start(api.clone(), session, Duration::from_millis(30_000));
        tokio::time::sleep(Duration::from_millis(60_001)).await;
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.snapshot().consecutive_failures, 3);

        tokio::time::sleep(Duration::from_millis(30_000)).await;
        assert_eq!(counter.count(), 5);
        assert_eq!(api.calls("notification_count"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_ticks_skip_the_network() {
        let api = FakeApi::new();
        let counter = NotificationCounter::start(
            api.clone(),
            anonymous_gate(&api).await,
            Duration::from_secs(30),
        );

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(api.calls("notification_count"), 0);
        assert_eq!(counter.snapshot().consecutive_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_poll_signs_session_out() {
        let api = FakeApi::new();
        let session = signed_in_gate(&api).await;
        api.push_notification(Err(SyncError::Unauthorized));

        let counter =
            NotificationCounter::start(api.clone(), session.clone(), Duration::from_secs(30));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!session.snapshot().is_authenticated());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.calls("notification_count"), 1);
        counter.stop();
    }
}
