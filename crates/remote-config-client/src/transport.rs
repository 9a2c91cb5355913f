//! Contract consumed from the network layer, plus an in-memory backend.
//!
//! The client never talks to the network directly: every retrieval goes
//! through a [`Transport`]. [`FakeTransport`] answers from a configurable
//! key/value map so the full fetch/activate protocol can be exercised without
//! a server.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::snapshot::{content_version, ConfigValue};

/// Parameters for a single retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieveRequest {
    /// Namespace the configuration belongs to.
    pub namespace: String,
    /// Version token of the snapshot the client already holds, if any.
    pub last_known_version: Option<String>,
    /// Maximum age the caller tolerates for cached data on the backend side.
    pub max_age: Duration,
}

/// Successful transport answers.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportResponse {
    /// The backend returned a (possibly identical) payload.
    Updated {
        entries: BTreeMap<String, ConfigValue>,
        /// Server-side version/ETag; derived from the payload when absent.
        version: Option<String>,
    },
    /// The backend confirmed the client's `last_known_version` is current.
    NotModified,
}

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server error: status {status}: {message}")]
    Server { status: u16, message: String },
}

/// Retrieves configuration payloads from the remote source.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn retrieve(&self, request: RetrieveRequest)
        -> Result<TransportResponse, TransportError>;
}

#[derive(Debug, Default)]
struct FakeState {
    config: Option<BTreeMap<String, ConfigValue>>,
    failure: Option<TransportError>,
    latency: Duration,
    last_request: Option<RetrieveRequest>,
}

/// In-memory backend serving whatever configuration the test installed.
///
/// With no configuration installed it serves an empty payload.
#[derive(Debug, Default)]
pub struct FakeTransport {
    state: Mutex<FakeState>,
    requests: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fake already serving `entries`.
    pub fn with_config<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ConfigValue>,
    {
        let fake = Self::new();
        fake.set_config(entries);
        fake
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the served configuration, simulating a console update.
    pub fn set_config<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ConfigValue>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.lock().config = Some(entries);
    }

    /// Removes the served configuration and any scripted failure.
    pub fn clear(&self) {
        let mut guard = self.lock();
        guard.config = None;
        guard.failure = None;
    }

    /// Makes every subsequent retrieval fail with `error` until cleared.
    pub fn fail_with(&self, error: TransportError) {
        self.lock().failure = Some(error);
    }

    /// Stops failing retrievals.
    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Delays every answer by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Number of retrievals served (including failed ones).
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<RetrieveRequest> {
        self.lock().last_request.clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn retrieve(
        &self,
        request: RetrieveRequest,
    ) -> Result<TransportResponse, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        // Snapshot the scripted answer before sleeping so the delay models
        // in-flight network time against the backend state at issue time.
        let (latency, answer) = {
            let mut guard = self.lock();
            guard.last_request = Some(request.clone());
            let answer = match &guard.failure {
                Some(error) => Err(error.clone()),
                None => Ok(guard.config.clone().unwrap_or_default()),
            };
            (guard.latency, answer)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let entries = answer?;
        let version = content_version(&entries);
        if request.last_known_version.as_deref() == Some(version.as_str()) {
            debug!("remote-config: fake backend reporting not-modified for {version}");
            return Ok(TransportResponse::NotModified);
        }
        Ok(TransportResponse::Updated {
            entries,
            version: Some(version),
        })
    }
}
