//! Telemetry helpers for the remote configuration client.
//!
//! Drop-in implementations of [`RemoteConfigTelemetry`]: atomic counters that
//! hosts can export to their own metrics backend, and a composite dispatcher
//! to fan events out to several observers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::RemoteConfigError;
use crate::service::{FetchSource, RemoteConfigTelemetry};

/// Aggregated telemetry counters (all values use relaxed atomics).
#[derive(Debug, Default)]
pub struct TelemetryCounters {
    fetch_remote: AtomicU64,
    fetch_not_modified: AtomicU64,
    fetch_cached: AtomicU64,
    fetch_error: AtomicU64,
    fetch_throttled: AtomicU64,
    activate_changed: AtomicU64,
    activate_unchanged: AtomicU64,
    activate_rejected: AtomicU64,
}

impl TelemetryCounters {
    /// Captures a point-in-time snapshot of the counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            fetch_remote: self.fetch_remote.load(Ordering::Relaxed),
            fetch_not_modified: self.fetch_not_modified.load(Ordering::Relaxed),
            fetch_cached: self.fetch_cached.load(Ordering::Relaxed),
            fetch_error: self.fetch_error.load(Ordering::Relaxed),
            fetch_throttled: self.fetch_throttled.load(Ordering::Relaxed),
            activate_changed: self.activate_changed.load(Ordering::Relaxed),
            activate_unchanged: self.activate_unchanged.load(Ordering::Relaxed),
            activate_rejected: self.activate_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Plain data representation of [`TelemetryCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetrySnapshot {
    /// Fetches that installed a new snapshot from the backend.
    pub fetch_remote: u64,
    /// Fetches the backend answered with "not modified".
    pub fetch_not_modified: u64,
    /// Throttled fetches served from the cached snapshot.
    pub fetch_cached: u64,
    /// Failed fetches.
    pub fetch_error: u64,
    /// Fetches denied by the throttle with nothing cached.
    pub fetch_throttled: u64,
    /// Promotions that changed the active mapping.
    pub activate_changed: u64,
    /// Promotions that left the active mapping as it was.
    pub activate_unchanged: u64,
    /// Legacy activations reported as errors.
    pub activate_rejected: u64,
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetch_remote={}, fetch_not_modified={}, fetch_cached={}, fetch_error={}, fetch_throttled={}, activate_changed={}, activate_unchanged={}, activate_rejected={}",
            self.fetch_remote,
            self.fetch_not_modified,
            self.fetch_cached,
            self.fetch_error,
            self.fetch_throttled,
            self.activate_changed,
            self.activate_unchanged,
            self.activate_rejected
        )
    }
}

/// Telemetry implementation that maintains atomic counters for every signal.
#[derive(Debug, Clone)]
pub struct CountingTelemetry {
    counters: Arc<TelemetryCounters>,
}

impl CountingTelemetry {
    /// Creates a new telemetry instance backed by the provided counter set.
    pub fn new(counters: Arc<TelemetryCounters>) -> Self {
        Self { counters }
    }

    /// Returns the underlying counter set.
    pub fn counters(&self) -> Arc<TelemetryCounters> {
        self.counters.clone()
    }
}

impl Default for CountingTelemetry {
    fn default() -> Self {
        Self::new(Arc::new(TelemetryCounters::default()))
    }
}

impl RemoteConfigTelemetry for CountingTelemetry {
    fn on_fetch_success(&self, source: FetchSource) {
        let counter = match source {
            FetchSource::Remote => &self.counters.fetch_remote,
            FetchSource::NotModified => &self.counters.fetch_not_modified,
            FetchSource::Cache => &self.counters.fetch_cached,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn on_fetch_error(&self, _error: &RemoteConfigError) {
        self.counters.fetch_error.fetch_add(1, Ordering::Relaxed);
    }

    fn on_fetch_throttled(&self, _retry_after: Duration) {
        self.counters
            .fetch_throttled
            .fetch_add(1, Ordering::Relaxed);
    }

    fn on_activate(&self, changed: bool) {
        if changed {
            self.counters
                .activate_changed
                .fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters
                .activate_unchanged
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_activate_rejected(&self, _error: &RemoteConfigError) {
        self.counters
            .activate_rejected
            .fetch_add(1, Ordering::Relaxed);
    }
}

/// Telemetry implementation that forwards events to multiple observers.
pub struct CompositeTelemetry {
    observers: Vec<Arc<dyn RemoteConfigTelemetry>>,
}

impl CompositeTelemetry {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Adds a telemetry observer to the dispatcher.
    pub fn with_observer(mut self, telemetry: Arc<dyn RemoteConfigTelemetry>) -> Self {
        self.observers.push(telemetry);
        self
    }
}

impl Default for CompositeTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompositeTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeTelemetry")
            .field("observer_count", &self.observers.len())
            .finish()
    }
}

impl RemoteConfigTelemetry for CompositeTelemetry {
    fn on_fetch_success(&self, source: FetchSource) {
        for observer in &self.observers {
            observer.on_fetch_success(source);
        }
    }

    fn on_fetch_error(&self, error: &RemoteConfigError) {
        for observer in &self.observers {
            observer.on_fetch_error(error);
        }
    }

    fn on_fetch_throttled(&self, retry_after: Duration) {
        for observer in &self.observers {
            observer.on_fetch_throttled(retry_after);
        }
    }

    fn on_activate(&self, changed: bool) {
        for observer in &self.observers {
            observer.on_activate(changed);
        }
    }

    fn on_activate_rejected(&self, error: &RemoteConfigError) {
        for observer in &self.observers {
            observer.on_activate_rejected(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Confirms counters increment for every telemetry callback.
    #[test]
    fn counting_telemetry_tracks_all_events() {
        let telemetry = CountingTelemetry::default();
        telemetry.on_fetch_success(FetchSource::Remote);
        telemetry.on_fetch_success(FetchSource::NotModified);
        telemetry.on_fetch_success(FetchSource::Cache);
        telemetry.on_fetch_error(&RemoteConfigError::Network("down".into()));
        telemetry.on_fetch_throttled(Duration::from_secs(3));
        telemetry.on_activate(true);
        telemetry.on_activate(false);
        telemetry.on_activate_rejected(&RemoteConfigError::NoOpActivation);

        let snapshot = telemetry.counters().snapshot();
        assert_eq!(
            snapshot,
            TelemetrySnapshot {
                fetch_remote: 1,
                fetch_not_modified: 1,
                fetch_cached: 1,
                fetch_error: 1,
                fetch_throttled: 1,
                activate_changed: 1,
                activate_unchanged: 1,
                activate_rejected: 1,
            }
        );
    }

    /// Ensures composite telemetry broadcasts to every observer.
    #[test]
    fn composite_telemetry_forwards_calls() {
        let primary = Arc::new(CountingTelemetry::default());
        let secondary = Arc::new(CountingTelemetry::default());

        let composite = CompositeTelemetry::new()
            .with_observer(primary.clone())
            .with_observer(secondary.clone());

        composite.on_fetch_success(FetchSource::Remote);
        composite.on_activate(true);
        composite.on_activate_rejected(&RemoteConfigError::NoOpActivation);

        for snapshot in [primary.counters().snapshot(), secondary.counters().snapshot()] {
            assert_eq!(snapshot.fetch_remote, 1);
            assert_eq!(snapshot.activate_changed, 1);
            assert_eq!(snapshot.activate_rejected, 1);
        }
        assert!(format!("{composite:?}").contains("observer_count"));
    }

    #[test]
    fn telemetry_snapshot_display_includes_all_fields() {
        let formatted = TelemetrySnapshot {
            fetch_remote: 1,
            fetch_error: 2,
            activate_rejected: 3,
            ..Default::default()
        }
        .to_string();
        for segment in ["fetch_remote=1", "fetch_error=2", "activate_rejected=3"] {
            assert!(
                formatted.contains(segment),
                "missing segment '{segment}' in '{formatted}'"
            );
        }
    }
}
