//! Auction countdowns.
//!
//! [`CountdownEngine`] is a pure state machine over a [`Deadline`] and a wall
//! clock reading. [`spawn_countdown`] drives it on a fixed tick and publishes
//! each [`CountdownState`] on a watch channel until the deadline passes or the
//! returned [`CountdownHandle`] is dropped.

mod clock;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub use clock::{Clock, ManualClock, SystemClock};

/// Below this much remaining time a countdown is rendered as urgent.
pub const URGENT_THRESHOLD_MS: i64 = 3_600_000;

const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_HOUR: u64 = 3_600;

/// Absolute point in time an auction or countdown targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deadline(DateTime<Utc>);

impl Deadline {
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    pub const fn at(&self) -> DateTime<Utc> {
        self.0
    }

    /// Signed milliseconds until the deadline; negative once it has passed.
    pub fn remaining_millis(&self, now: DateTime<Utc>) -> i64 {
        (self.0 - now).num_milliseconds()
    }
}

impl FromStr for Deadline {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(DateTime::parse_from_rfc3339(s.trim())?.with_timezone(&Utc)))
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Snapshot of a countdown at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownState {
    /// Time left, clamped at zero.
    pub remaining: Duration,
    /// Latched: once true it never reverts for the same engine.
    pub expired: bool,
    /// Strictly less than one hour remains.
    pub urgent: bool,
}

impl fmt::Display for CountdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_remaining(self))
    }
}

/// Render the remaining time as its largest significant units.
///
/// `2d 03h 15m` with days left, `3h 15m 09s` with hours left, otherwise
/// `15m 09s`. Expired countdowns render as `Ended`.
pub fn format_remaining(state: &CountdownState) -> String {
    if state.expired {
        return "Ended".to_string();
    }

    let total = state.remaining.as_secs();
    let days = total / SECONDS_PER_DAY;
    let hours = (total % SECONDS_PER_DAY) / SECONDS_PER_HOUR;
    let minutes = (total % SECONDS_PER_HOUR) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{days}d {hours:02}h {minutes:02}m")
    } else if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else {
        format!("{minutes}m {seconds:02}s")
    }
}

type ExpireCallback = Box<dyn FnOnce() + Send + 'static>;

/// Deadline state machine with a one-shot expiry callback.
pub struct CountdownEngine {
    deadline: Deadline,
    expired: bool,
    on_expire: Option<ExpireCallback>,
}

impl CountdownEngine {
    pub const fn new(deadline: Deadline) -> Self {
        Self {
            deadline,
            expired: false,
            on_expire: None,
        }
    }

    #[must_use]
    pub fn with_on_expire(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_expire = Some(Box::new(callback));
        self
    }

    pub const fn deadline(&self) -> Deadline {
        self.deadline
    }

    pub const fn is_expired(&self) -> bool {
        self.expired
    }

    /// Recompute the state for the given wall-clock reading.
    ///
    /// The first evaluation at or past the deadline latches `expired` and
    /// consumes the expiry callback.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> CountdownState {
        let remaining_ms = self.deadline.remaining_millis(now);

        if !self.expired && remaining_ms <= 0 {
            self.expired = true;
            tracing::debug!("Countdown for {} expired", self.deadline);
            if let Some(callback) = self.on_expire.take() {
                callback();
            }
        }

        let remaining_ms = if self.expired { 0 } else { remaining_ms };
        CountdownState {
            remaining: Duration::from_millis(u64::try_from(remaining_ms).unwrap_or(0)),
            expired: self.expired,
            urgent: remaining_ms < URGENT_THRESHOLD_MS,
        }
    }
}

impl fmt::Debug for CountdownEngine {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CountdownEngine")
            .field("deadline", &self.deadline)
            .field("expired", &self.expired)
            .field("has_on_expire", &self.on_expire.is_some())
            .finish()
    }
}

/// Owner of a running countdown. Dropping it cancels the tick schedule.
#[derive(Debug)]
pub struct CountdownHandle {
    state: watch::Receiver<CountdownState>,
    task: Option<JoinHandle<()>>,
}

impl CountdownHandle {
    pub fn current(&self) -> CountdownState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CountdownState> {
        self.state.clone()
    }

    /// Wait for the next published state; `None` once the countdown is over.
    pub async fn changed(&mut self) -> Option<CountdownState> {
        self.state.changed().await.ok()?;
        Some(*self.state.borrow_and_update())
    }

    /// Resolve once the deadline has passed.
    pub async fn wait_expired(&mut self) -> CountdownState {
        let result = self.state.wait_for(|state| state.expired).await.map(|state| *state);
        result.unwrap_or_else(|_| *self.state.borrow())
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop ticking. Equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Evaluate `engine` now, then once per `tick` until it expires.
///
/// A deadline already in the past expires (and fires its callback) before
/// this function returns, and no task is spawned.
pub fn spawn_countdown<C>(mut engine: CountdownEngine, clock: C, tick: Duration) -> CountdownHandle
where
    C: Clock + 'static,
{
    let initial = engine.evaluate(clock.now());
    let (sender, receiver) = watch::channel(initial);
    if initial.expired {
        return CountdownHandle {
            state: receiver,
            task: None,
        };
    }

    let tick = tick.max(Duration::from_millis(1));
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and was covered by `initial`.
        interval.tick().await;

        loop {
            interval.tick().await;
            let state = engine.evaluate(clock.now());
            sender.send_replace(state);
            if state.expired {
                break;
            }
        }
    });

    CountdownHandle {
        state: receiver,
        task: Some(task),
    }
}
