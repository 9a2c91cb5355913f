//! Single versioned retrieval of the remote snapshot.
//!
//! [`FetchClient`] is stateless: it turns one transport call into a
//! [`FetchOutcome`] and leaves every store mutation to the service layer.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::timeout;
use tracing::debug;

use crate::snapshot::{content_version, ConfigSnapshot};
use crate::transport::{RetrieveRequest, Transport, TransportError, TransportResponse};

/// Effective parameters of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Namespace forwarded to the transport.
    pub namespace: String,
    /// Version token of the currently fetched snapshot, if any.
    pub last_known_version: Option<String>,
    /// Expiration/interval honoured for this fetch.
    pub max_age: Duration,
    /// Upper bound on the transport call.
    pub timeout: Duration,
}

/// Why a fetch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    Network(String),
    Server { status: u16, message: String },
    Timeout(Duration),
    /// Denied by the minimum interval with no cached snapshot to fall back to.
    Throttled { retry_after: Duration },
}

impl From<TransportError> for FetchFailure {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Network(message) => Self::Network(message),
            TransportError::Server { status, message } => Self::Server { status, message },
        }
    }
}

/// Tri-state result of a fetch. Carries no side effect of its own.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A new snapshot to install into the fetched slot.
    Success(ConfigSnapshot),
    /// The backend confirmed the fetched snapshot is still current.
    NoChange,
    Failure(FetchFailure),
}

/// Performs retrievals through a [`Transport`].
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient").finish_non_exhaustive()
    }
}

impl FetchClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Retrieves the remote snapshot once, honouring `policy.timeout`.
    pub async fn fetch(&self, policy: &FetchPolicy) -> FetchOutcome {
        let request = RetrieveRequest {
            namespace: policy.namespace.clone(),
            last_known_version: policy.last_known_version.clone(),
            max_age: policy.max_age,
        };
        debug!(
            "remote-config: retrieving namespace '{}' (last known version: {:?})",
            request.namespace, request.last_known_version
        );
        match timeout(policy.timeout, self.transport.retrieve(request)).await {
            Err(_) => FetchOutcome::Failure(FetchFailure::Timeout(policy.timeout)),
            Ok(Err(error)) => FetchOutcome::Failure(error.into()),
            Ok(Ok(TransportResponse::NotModified)) => FetchOutcome::NoChange,
            Ok(Ok(TransportResponse::Updated { entries, version })) => {
                let version = version.unwrap_or_else(|| content_version(&entries));
                FetchOutcome::Success(ConfigSnapshot::new(
                    entries,
                    Some(version),
                    OffsetDateTime::now_utc(),
                ))
            }
        }
    }
}
