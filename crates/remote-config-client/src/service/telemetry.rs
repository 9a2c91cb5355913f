//! Service-level telemetry abstractions.
//!
//! Embedders can implement [`RemoteConfigTelemetry`] to observe fetch and
//! activation outcomes without depending on the internal client state. A
//! no-op implementation is installed by default.

use std::time::Duration;

use super::FetchSource;
use crate::error::RemoteConfigError;

/// Telemetry hook invoked on significant client events.
pub trait RemoteConfigTelemetry: Send + Sync {
    /// Called after a fetch succeeded, with how it was satisfied.
    fn on_fetch_success(&self, _source: FetchSource) {}
    /// Called when a fetch failed (network, server, or timeout).
    fn on_fetch_error(&self, _error: &RemoteConfigError) {}
    /// Called when a fetch was denied by the minimum interval with nothing cached.
    fn on_fetch_throttled(&self, _retry_after: Duration) {}
    /// Called after every promotion that had something to promote.
    fn on_activate(&self, _changed: bool) {}
    /// Called when the legacy contract reports an activation error.
    fn on_activate_rejected(&self, _error: &RemoteConfigError) {}
}

/// Default telemetry implementation that performs no-ops.
#[derive(Debug, Default)]
pub(crate) struct NoopTelemetry;

impl RemoteConfigTelemetry for NoopTelemetry {}
