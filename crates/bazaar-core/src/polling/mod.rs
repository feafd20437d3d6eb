//! Periodic fetch loops with cancellation.
//!
//! [`spawn_poller`] invokes a fetch immediately and then on every interval
//! until the returned [`PollHandle`] is stopped or dropped. Calls may overlap:
//! a slow response never delays the next tick. Each call carries a sequence
//! number and only a response newer than the last applied one may update the
//! snapshot, so a late, older response cannot overwrite fresher data.
//! Failures are logged and counted, never surfaced, and keep the last good
//! value in place.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::SyncResult;
use crate::util::lock_unpoisoned;

/// What a view renders from a polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSnapshot<T> {
    /// Last successfully fetched value.
    pub value: Option<T>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for PollSnapshot<T> {
    fn default() -> Self {
        Self {
            value: None,
            last_error: None,
            consecutive_failures: 0,
            updated_at: None,
        }
    }
}

#[derive(Debug, Default)]
struct PollProgress {
    stopped: bool,
    issued: u64,
    applied: u64,
    /// Newest sequence that resolved with an error.
    failed: u64,
}

struct PollShared<T> {
    label: String,
    progress: Mutex<PollProgress>,
    snapshot: watch::Sender<PollSnapshot<T>>,
}

impl<T> PollShared<T> {
    /// Reserve the next sequence number, or `None` once stopped.
    fn begin(&self) -> Option<u64> {
        let mut progress = lock_unpoisoned(&self.progress);
        if progress.stopped {
            return None;
        }
        progress.issued += 1;
        Some(progress.issued)
    }

    fn complete(&self, sequence: u64, result: SyncResult<T>) {
        let mut progress = lock_unpoisoned(&self.progress);
        if progress.stopped {
            tracing::debug!("{}: discarding poll #{sequence} resolved after stop", self.label);
            return;
        }
        if sequence <= progress.applied {
            tracing::debug!(
                "{}: discarding poll #{sequence}, superseded by #{}",
                self.label,
                progress.applied
            );
            return;
        }

        match result {
            Ok(value) => {
                progress.applied = sequence;
                let healthy = sequence > progress.failed;
                self.snapshot.send_modify(|snapshot| {
                    snapshot.value = Some(value);
                    if healthy {
                        snapshot.last_error = None;
                        snapshot.consecutive_failures = 0;
                    }
                    snapshot.updated_at = Some(Utc::now());
                });
            }
            Err(error) => {
                progress.failed = progress.failed.max(sequence);
                if error.is_transient() {
                    tracing::warn!("{}: poll #{sequence} failed, retrying: {}", self.label, error);
                } else {
                    tracing::info!("{}: poll #{sequence} rejected: {}", self.label, error);
                }
                self.snapshot.send_modify(|snapshot| {
                    snapshot.last_error = Some(error.to_string());
                    snapshot.consecutive_failures = snapshot.consecutive_failures.saturating_add(1);
                });
            }
        }
    }

    fn stop(&self) -> bool {
        let mut progress = lock_unpoisoned(&self.progress);
        let was_running = !progress.stopped;
        progress.stopped = true;
        was_running
    }
}

/// Owner of a polling loop. Dropping it stops the loop.
pub struct PollHandle<T> {
    shared: Arc<PollShared<T>>,
    snapshot: watch::Receiver<PollSnapshot<T>>,
    task: JoinHandle<()>,
}

impl<T: Clone> PollHandle<T> {
    pub fn snapshot(&self) -> PollSnapshot<T> {
        self.snapshot.borrow().clone()
    }

    /// Last successfully fetched value.
    pub fn latest(&self) -> Option<T> {
        self.snapshot.borrow().value.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot<T>> {
        self.snapshot.clone()
    }

    /// Wait for the next snapshot change; `None` once the loop is gone.
    pub async fn changed(&mut self) -> Option<PollSnapshot<T>> {
        self.snapshot.changed().await.ok()?;
        Some(self.snapshot.borrow_and_update().clone())
    }
}

impl<T> PollHandle<T> {
    /// Cancel the next scheduled tick and ignore any in-flight responses.
    pub fn stop(&self) {
        if self.shared.stop() {
            tracing::debug!("{}: polling stopped", self.shared.label);
        }
        self.task.abort();
    }

    pub fn is_stopped(&self) -> bool {
        lock_unpoisoned(&self.shared.progress).stopped
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start polling `fetch` every `interval`, beginning immediately.
pub fn spawn_poller<T, F, Fut>(
    label: impl Into<String>,
    interval: Duration,
    fetch: F,
) -> PollHandle<T>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SyncResult<T>> + Send + 'static,
{
    let (sender, receiver) = watch::channel(PollSnapshot::default());
    let shared = Arc::new(PollShared {
        label: label.into(),
        progress: Mutex::new(PollProgress::default()),
        snapshot: sender,
    });

    let interval = interval.max(Duration::from_millis(1));
    let loop_shared = Arc::clone(&shared);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(sequence) = loop_shared.begin() else {
                break;
            };
            let call = fetch();
            let call_shared = Arc::clone(&loop_shared);
            tokio::spawn(async move {
                let result = call.await;
                call_shared.complete(sequence, result);
            });
        }
    });

    PollHandle {
        shared,
        snapshot: receiver,
        task,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::SyncError;

    type Script = Arc<Mutex<VecDeque<(Duration, SyncResult<u64>)>>>;

    /// Fetch that replays `(delay, result)` pairs in call order.
    fn scripted(
        steps: Vec<(Duration, SyncResult<u64>)>,
    ) -> (
        Arc<AtomicUsize>,
        impl Fn() -> std::pin::Pin<Box<dyn Future<Output = SyncResult<u64>> + Send>> + Send + Sync,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let script: Script = Arc::new(Mutex::new(steps.into_iter().collect()));
        let counter = Arc::clone(&calls);
        let fetch = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let step = script.lock().unwrap().pop_front();
            Box::pin(async move {
                let (delay, result) = step.unwrap_or_else(|| {
                    let exhausted = SyncError::Network("script exhausted".to_string());
                    (Duration::ZERO, Err(exhausted))
                });
                tokio::time::sleep(delay).await;
                result
            }) as std::pin::Pin<Box<dyn Future<Output = SyncResult<u64>> + Send>>
        };
        (calls, fetch)
    }

    fn offline() -> SyncResult<u64> {
        Err(SyncError::Network("connection refused".to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn fires_immediately_then_on_interval() {
        let (calls, fetch) = scripted(vec![
            (Duration::ZERO, Ok(1)),
            (Duration::ZERO, Ok(2)),
            (Duration::ZERO, Ok(3)),
        ]);
        let handle = spawn_poller("test", Duration::from_secs(30), fetch);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.latest(), Some(1));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(handle.latest(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn three_failures_then_success_shows_latest_total() {
        let (calls, fetch) = scripted(vec![
            (Duration::ZERO, offline()),
            (Duration::ZERO, offline()),
            (Duration::ZERO, offline()),
            (Duration::ZERO, Ok(5)),
        ]);
        let handle = spawn_poller("notifications", Duration::from_millis(30_000), fetch);

        tokio::time::sleep(Duration::from_millis(60_001)).await;
        let snapshot = handle.snapshot();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(snapshot.value, None);
        assert_eq!(snapshot.consecutive_failures, 3);
        assert!(snapshot.last_error.is_some());
        assert!(!handle.is_stopped());

        tokio::time::sleep(Duration::from_millis(30_000)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.value, Some(5));
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_last_good_value() {
        let (_calls, fetch) = scripted(vec![(Duration::ZERO, Ok(7)), (Duration::ZERO, offline())]);
        let handle = spawn_poller("test", Duration::from_secs(10), fetch);

        tokio::time::sleep(Duration::from_millis(10_001)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.value, Some(7));
        assert_eq!(snapshot.consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn response_after_stop_is_ignored() {
        let (calls, fetch) = scripted(vec![(Duration::from_secs(5), Ok(9))]);
        let handle = spawn_poller("test", Duration::from_secs(30), fetch);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        handle.stop();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(handle.snapshot(), PollSnapshot::default());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handle.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_older_response_cannot_overwrite_newer_one() {
        let (calls, fetch) = scripted(vec![
            (Duration::from_secs(45), Ok(1)),
            (Duration::from_secs(1), Ok(2)),
        ]);
        let handle = spawn_poller("test", Duration::from_secs(30), fetch);

        tokio::time::sleep(Duration::from_secs(32)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(handle.latest(), Some(2));

        tokio::time::sleep(Duration::from_secs(14)).await;
        assert_eq!(handle.latest(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn newer_failure_survives_late_older_success() {
        let (calls, fetch) = scripted(vec![
            (Duration::from_secs(45), Ok(1)),
            (Duration::from_secs(1), offline()),
        ]);
        let handle = spawn_poller("test", Duration::from_secs(30), fetch);

        tokio::time::sleep(Duration::from_secs(32)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.value, None);
        assert_eq!(snapshot.consecutive_failures, 1);
        assert!(snapshot.last_error.is_some());

        tokio::time::sleep(Duration::from_secs(14)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.value, Some(1));
        assert_eq!(snapshot.consecutive_failures, 1);
        assert_eq!(
            snapshot.last_error.as_deref(),
            Some("Network request failed: connection refused")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_schedule() {
        let (calls, fetch) = scripted(vec![(Duration::ZERO, Ok(1)), (Duration::ZERO, Ok(2))]);
        let handle = spawn_poller("test", Duration::from_secs(30), fetch);
        tokio::time::sleep(Duration::from_millis(1)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
