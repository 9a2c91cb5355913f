//! Host-facing remote configuration client.
//!
//! [`RemoteConfig`] puts the throttler and fetch client in front of the
//! two-slot store. Fetching is the only asynchronous step; activation is a
//! synchronous swap that never suspends. Callback adapters are layered on top
//! for hosts that prefer completion handlers over futures.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::activation::{legacy_result, modern_result, ActivationState, Activator};
use super::fetch::{FetchClient, FetchFailure, FetchOutcome, FetchPolicy};
use super::telemetry::{NoopTelemetry, RemoteConfigTelemetry};
use crate::config::RemoteConfigSettings;
use crate::error::RemoteConfigError;
use crate::snapshot::ConfigValue;
use crate::status::StatusSnapshot;
use crate::store::{ConfigStore, Promotion, ValueSource};
use crate::throttle::{FetchStatus, Throttler};
use crate::transport::Transport;

/// How a successful fetch was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// A new snapshot was installed into the fetched slot.
    Remote,
    /// The backend confirmed the fetched snapshot is still current.
    NotModified,
    /// The throttle denied the request and the cached snapshot was kept.
    Cache,
}

/// Outcome reported by [`RemoteConfig::fetch_and_activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAndActivateStatus {
    SuccessFetchedFromRemote,
    SuccessUsingPreFetchedData,
    /// Only reported through the completion adapter, alongside the error.
    Error,
}

/// A value resolved for the host together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfigValue {
    pub value: Option<ConfigValue>,
    pub source: ValueSource,
}

struct Shared {
    store: Arc<ConfigStore>,
    activator: Activator,
    throttler: Throttler,
    fetch_client: FetchClient,
    settings: RwLock<RemoteConfigSettings>,
    telemetry: RwLock<Arc<dyn RemoteConfigTelemetry>>,
}

/// Remote configuration client owned by the host's composition root.
///
/// Cloning is cheap and every clone observes the same store.
#[derive(Clone)]
pub struct RemoteConfig {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("settings", &self.settings())
            .field("state", &self.state())
            .field("last_fetch_status", &self.last_fetch_status())
            .finish_non_exhaustive()
    }
}

impl RemoteConfig {
    /// Builds a client over `transport`. The settings are sanitised up-front.
    pub fn new(transport: Arc<dyn Transport>, settings: RemoteConfigSettings) -> Self {
        let settings = settings.sanitise();
        let store = Arc::new(ConfigStore::new());
        let shared = Shared {
            activator: Activator::new(store.clone()),
            throttler: Throttler::new(settings.minimum_fetch_interval),
            fetch_client: FetchClient::new(transport),
            settings: RwLock::new(settings),
            telemetry: RwLock::new(Arc::new(NoopTelemetry)),
            store,
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Installs a telemetry observer, replacing the previous one.
    pub fn set_telemetry(&self, telemetry: Arc<dyn RemoteConfigTelemetry>) {
        *self
            .shared
            .telemetry
            .write()
            .unwrap_or_else(PoisonError::into_inner) = telemetry;
    }

    fn telemetry(&self) -> Arc<dyn RemoteConfigTelemetry> {
        self.shared
            .telemetry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn settings(&self) -> RemoteConfigSettings {
        self.shared
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the settings; the new minimum interval applies to the next fetch.
    pub fn set_settings(&self, settings: RemoteConfigSettings) {
        let settings = settings.sanitise();
        self.shared
            .throttler
            .set_minimum_interval(settings.minimum_fetch_interval);
        *self
            .shared
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Fetches using the configured minimum fetch interval.
    pub async fn fetch(&self) -> Result<FetchSource, RemoteConfigError> {
        self.fetch_inner(None).await
    }

    /// Fetches with a per-call expiration that overrides the minimum interval.
    ///
    /// A zero expiration always goes to the network.
    pub async fn fetch_with_expiration(
        &self,
        expiration: Duration,
    ) -> Result<FetchSource, RemoteConfigError> {
        self.fetch_inner(Some(expiration)).await
    }

    async fn fetch_inner(
        &self,
        expiration: Option<Duration>,
    ) -> Result<FetchSource, RemoteConfigError> {
        let shared = &self.shared;
        let telemetry = self.telemetry();

        if let Some(retry_after) = shared.throttler.time_until_allowed(Instant::now(), expiration)
        {
            if shared.store.fetched().is_some() {
                debug!("remote-config: fetch throttled for {retry_after:?}; serving cached config");
                telemetry.on_fetch_success(FetchSource::Cache);
                return Ok(FetchSource::Cache);
            }
            shared.throttler.record_throttled();
            debug!("remote-config: fetch throttled for {retry_after:?}; nothing cached");
            telemetry.on_fetch_throttled(retry_after);
            return Err(FetchFailure::Throttled { retry_after }.into());
        }

        let settings = self.settings();
        let sequence = shared.store.begin_fetch();
        let _in_flight = shared.activator.fetch_started();
        let policy = FetchPolicy {
            namespace: settings.namespace,
            last_known_version: shared
                .store
                .fetched()
                .and_then(|snapshot| snapshot.version().map(str::to_owned)),
            max_age: expiration.unwrap_or(settings.minimum_fetch_interval),
            timeout: settings.fetch_timeout,
        };

        match shared.fetch_client.fetch(&policy).await {
            FetchOutcome::Success(snapshot) => {
                let keys = snapshot.len();
                if !shared.store.set_fetched(snapshot, sequence) {
                    debug!("remote-config: fetch #{sequence} superseded by a later fetch");
                }
                shared.throttler.record_success(Instant::now());
                debug!("remote-config: fetch #{sequence} returned {keys} keys");
                telemetry.on_fetch_success(FetchSource::Remote);
                Ok(FetchSource::Remote)
            }
            FetchOutcome::NoChange => {
                shared.store.confirm_fetched(sequence);
                shared.throttler.record_success(Instant::now());
                debug!("remote-config: fetch #{sequence} not modified");
                telemetry.on_fetch_success(FetchSource::NotModified);
                Ok(FetchSource::NotModified)
            }
            FetchOutcome::Failure(failure) => {
                shared.throttler.record_failure();
                let error = RemoteConfigError::from(failure);
                warn!("remote-config: fetch #{sequence} failed: {error}");
                telemetry.on_fetch_error(&error);
                Err(error)
            }
        }
    }

    fn promote(&self) -> Promotion {
        let promotion = self.shared.activator.promote();
        if promotion.error.is_none() {
            self.telemetry().on_activate(promotion.changed);
        }
        promotion
    }

    /// Promotes the fetched snapshot and reports whether the active mapping changed.
    ///
    /// Never fails: with nothing fetched the result is `Ok(false)`.
    pub fn activate(&self) -> Result<bool, RemoteConfigError> {
        modern_result(&self.promote())
    }

    /// Promotes the fetched snapshot under the legacy contract.
    ///
    /// Fails with [`RemoteConfigError::NoFetchedConfig`] before the first
    /// successful fetch, and with [`RemoteConfigError::NoOpActivation`] when a
    /// repeated promotion left the active mapping unchanged.
    pub fn activate_legacy(&self) -> Result<(), RemoteConfigError> {
        let result = legacy_result(&self.promote());
        if let Err(error) = &result {
            debug!("remote-config: legacy activation rejected: {error}");
            self.telemetry().on_activate_rejected(error);
        }
        result
    }

    /// Fetches, then activates with the legacy contract.
    ///
    /// A fetch failure is returned as-is and no promotion is attempted.
    pub async fn fetch_and_activate(&self) -> Result<FetchAndActivateStatus, RemoteConfigError> {
        let source = self.fetch().await?;
        self.activate_legacy()?;
        Ok(match source {
            FetchSource::Remote => FetchAndActivateStatus::SuccessFetchedFromRemote,
            FetchSource::NotModified | FetchSource::Cache => {
                FetchAndActivateStatus::SuccessUsingPreFetchedData
            }
        })
    }

    /// Spawns [`RemoteConfig::fetch`] on the current runtime and reports the
    /// resulting fetch status. Must be called from within a tokio runtime.
    pub fn fetch_with_completion<F>(&self, completion: F) -> JoinHandle<()>
    where
        F: FnOnce(FetchStatus, Option<RemoteConfigError>) + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            let result = client.fetch().await;
            client.complete_fetch(result, completion);
        })
    }

    /// Callback form of [`RemoteConfig::fetch_with_expiration`].
    pub fn fetch_with_expiration_and_completion<F>(
        &self,
        expiration: Duration,
        completion: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(FetchStatus, Option<RemoteConfigError>) + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            let result = client.fetch_with_expiration(expiration).await;
            client.complete_fetch(result, completion);
        })
    }

    fn complete_fetch<F>(&self, result: Result<FetchSource, RemoteConfigError>, completion: F)
    where
        F: FnOnce(FetchStatus, Option<RemoteConfigError>),
    {
        match result {
            Ok(_) => completion(FetchStatus::Success, None),
            Err(error) => completion(failed_fetch_status(&error), Some(error)),
        }
    }

    /// Callback form of [`RemoteConfig::activate`]; runs inline.
    pub fn activate_with_completion<F>(&self, completion: F)
    where
        F: FnOnce(bool, Option<RemoteConfigError>),
    {
        match self.activate() {
            Ok(changed) => completion(changed, None),
            Err(error) => completion(false, Some(error)),
        }
    }

    /// Callback form of [`RemoteConfig::activate_legacy`]; runs inline.
    pub fn activate_legacy_with_completion<F>(&self, completion: F)
    where
        F: FnOnce(Option<RemoteConfigError>),
    {
        completion(self.activate_legacy().err());
    }

    /// Callback form of [`RemoteConfig::fetch_and_activate`].
    pub fn fetch_and_activate_with_completion<F>(&self, completion: F) -> JoinHandle<()>
    where
        F: FnOnce(FetchAndActivateStatus, Option<RemoteConfigError>) + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            match client.fetch_and_activate().await {
                Ok(status) => completion(status, None),
                Err(error) => completion(FetchAndActivateStatus::Error, Some(error)),
            }
        })
    }

    /// Active value for `key`, without falling back to defaults.
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.shared.store.get_active(key)
    }

    /// Resolves `key` against the active config, then the in-app defaults.
    pub fn value(&self, key: &str) -> RemoteConfigValue {
        match self.shared.store.value(key) {
            Some((value, source)) => RemoteConfigValue {
                value: Some(value),
                source,
            },
            None => RemoteConfigValue {
                value: None,
                source: ValueSource::Static,
            },
        }
    }

    /// Replaces the in-app defaults.
    pub fn set_defaults<I, K, V>(&self, defaults: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ConfigValue>,
    {
        let defaults: BTreeMap<String, ConfigValue> = defaults
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.shared.store.set_defaults(defaults);
    }

    /// Sorted keys known to `source`.
    pub fn keys(&self, source: ValueSource) -> Vec<String> {
        self.shared.store.keys(source)
    }

    pub fn last_fetch_status(&self) -> FetchStatus {
        self.shared.throttler.last_status()
    }

    /// Wall-clock time of the last successful fetch.
    pub fn last_fetch_time(&self) -> Option<OffsetDateTime> {
        self.shared.throttler.last_fetch_time()
    }

    pub fn state(&self) -> ActivationState {
        self.shared.activator.state()
    }

    /// Captures a diagnostic snapshot of the client.
    pub fn status(&self) -> StatusSnapshot {
        let store = &self.shared.store;
        let active = store.active();
        StatusSnapshot {
            last_fetch_status: self.last_fetch_status(),
            last_fetch_time: self.last_fetch_time(),
            state: self.state(),
            fetched_version: store
                .fetched()
                .and_then(|snapshot| snapshot.version().map(str::to_owned)),
            active_version: active.version().map(str::to_owned),
            active_keys: active.len(),
            promotions: store.promotion_count(),
        }
    }
}

fn failed_fetch_status(error: &RemoteConfigError) -> FetchStatus {
    match error {
        RemoteConfigError::Throttled { .. } => FetchStatus::Throttled,
        _ => FetchStatus::Failure,
    }
}
