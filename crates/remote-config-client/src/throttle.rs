//! Minimum-interval fetch gate.
//!
//! The throttler only remembers when the last *successful* fetch happened:
//! failures never reset the window, so a flapping backend cannot be hammered
//! by retries that each look like a fresh start.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::Instant;

/// Outcome of the most recent fetch attempt, as reported to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// No fetch has completed yet.
    NoFetchYet,
    /// The last fetch succeeded (from the network or from cache).
    Success,
    /// The last fetch failed.
    Failure,
    /// The last fetch was denied by the minimum interval with nothing cached.
    Throttled,
}

impl FetchStatus {
    /// Label used in logs and status payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoFetchYet => "no_fetch_yet",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Throttled => "throttled",
        }
    }
}

#[derive(Debug)]
struct ThrottleState {
    minimum_interval: Duration,
    last_success: Option<Instant>,
    last_fetch_time: Option<OffsetDateTime>,
    last_status: FetchStatus,
}

/// Tracks the last successful fetch and decides whether a new one may hit the network.
#[derive(Debug)]
pub struct Throttler {
    state: Mutex<ThrottleState>,
}

impl Throttler {
    /// Creates a throttler enforcing `minimum_interval` between successful fetches.
    pub fn new(minimum_interval: Duration) -> Self {
        Self {
            state: Mutex::new(ThrottleState {
                minimum_interval,
                last_success: None,
                last_fetch_time: None,
                last_status: FetchStatus::NoFetchYet,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThrottleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn minimum_interval(&self) -> Duration {
        self.lock().minimum_interval
    }

    pub fn set_minimum_interval(&self, interval: Duration) {
        self.lock().minimum_interval = interval;
    }

    /// Returns `true` when a fetch issued at `now` may go to the network.
    ///
    /// `expiration` replaces the stored minimum interval for this call only.
    pub fn should_fetch(&self, now: Instant, expiration: Option<Duration>) -> bool {
        self.time_until_allowed(now, expiration).is_none()
    }

    /// Remaining wait before a fetch is allowed, or `None` when it is allowed now.
    pub fn time_until_allowed(&self, now: Instant, expiration: Option<Duration>) -> Option<Duration> {
        let guard = self.lock();
        let interval = expiration.unwrap_or(guard.minimum_interval);
        if interval.is_zero() {
            return None;
        }
        let last = guard.last_success?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed >= interval {
            None
        } else {
            Some(interval - elapsed)
        }
    }

    /// Records a successful fetch completed at `now`, opening a new window.
    pub fn record_success(&self, now: Instant) {
        let mut guard = self.lock();
        guard.last_success = Some(now);
        guard.last_fetch_time = Some(OffsetDateTime::now_utc());
        guard.last_status = FetchStatus::Success;
    }

    /// Records a failed fetch; the throttle window is left untouched.
    pub fn record_failure(&self) {
        self.lock().last_status = FetchStatus::Failure;
    }

    /// Records a fetch denied by the throttle with no cached fallback.
    pub fn record_throttled(&self) {
        self.lock().last_status = FetchStatus::Throttled;
    }

    pub fn last_status(&self) -> FetchStatus {
        self.lock().last_status
    }

    /// Monotonic instant of the last successful fetch.
    pub fn last_success(&self) -> Option<Instant> {
        self.lock().last_success
    }

    /// Wall-clock time of the last successful fetch.
    pub fn last_fetch_time(&self) -> Option<OffsetDateTime> {
        self.lock().last_fetch_time
    }
}
