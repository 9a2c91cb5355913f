//! Shared fixtures and utilities for remote-config service tests.

#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::telemetry::RemoteConfigTelemetry;
use super::{FetchSource, RemoteConfig};
use crate::config::RemoteConfigSettings;
use crate::error::RemoteConfigError;
use crate::transport::FakeTransport;

/// Builds an unthrottled client over a fresh fake backend.
pub(crate) fn build_client() -> (RemoteConfig, Arc<FakeTransport>) {
    build_client_with_settings(RemoteConfigSettings::unthrottled())
}

pub(crate) fn build_client_with_settings(
    settings: RemoteConfigSettings,
) -> (RemoteConfig, Arc<FakeTransport>) {
    let transport = Arc::new(FakeTransport::new());
    let client = RemoteConfig::new(transport.clone(), settings);
    (client, transport)
}

/// Settings enforcing `interval` between network fetches.
pub(crate) fn throttled_settings(interval: Duration) -> RemoteConfigSettings {
    RemoteConfigSettings {
        minimum_fetch_interval: interval,
        ..RemoteConfigSettings::default()
    }
}

/// Telemetry implementation that records event counters for assertions.
#[derive(Default)]
pub(crate) struct RecordingTelemetry {
    pub remote: AtomicUsize,
    pub not_modified: AtomicUsize,
    pub cached: AtomicUsize,
    pub error: AtomicUsize,
    pub throttled: AtomicUsize,
    /// Promotions, changed or not.
    pub activations: AtomicUsize,
    pub rejected: AtomicUsize,
}

impl RemoteConfigTelemetry for RecordingTelemetry {
    fn on_fetch_success(&self, source: FetchSource) {
        let counter = match source {
            FetchSource::Remote => &self.remote,
            FetchSource::NotModified => &self.not_modified,
            FetchSource::Cache => &self.cached,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn on_fetch_error(&self, _error: &RemoteConfigError) {
        self.error.fetch_add(1, Ordering::Relaxed);
    }

    fn on_fetch_throttled(&self, _retry_after: Duration) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    fn on_activate(&self, _changed: bool) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    fn on_activate_rejected(&self, _error: &RemoteConfigError) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }
}
