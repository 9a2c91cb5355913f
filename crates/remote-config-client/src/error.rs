//! Error taxonomy surfaced to hosts through every fetch/activate contract.

use std::time::Duration;

use thiserror::Error;

use crate::service::fetch::FetchFailure;

/// Public error codes, numerically stable for hosts that match on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Unknown = 8001,
    Throttled = 8002,
    InternalError = 8003,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Errors returned by the remote configuration client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteConfigError {
    /// Transport-level failure (DNS, socket, TLS, ...).
    #[error("network error: {0}")]
    Network(String),
    /// The backend answered with an error.
    #[error("server error: status {status}: {message}")]
    Server { status: u16, message: String },
    /// The fetch did not complete within its timeout.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    /// The fetch was denied by the minimum interval and nothing was cached.
    #[error("fetch throttled; retry in {retry_after:?}")]
    Throttled { retry_after: Duration },
    /// Activation was requested before any configuration was fetched.
    #[error("no fetched config to activate")]
    NoFetchedConfig,
    /// Legacy activation repeated with nothing new to activate.
    #[error("activation did not change the active config")]
    NoOpActivation,
}

impl RemoteConfigError {
    /// Maps the error onto its public code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Network(_) | Self::Server { .. } | Self::Timeout(_) => ErrorCode::Unknown,
            Self::Throttled { .. } => ErrorCode::Throttled,
            Self::NoFetchedConfig | Self::NoOpActivation => ErrorCode::InternalError,
        }
    }

    /// Returns `true` for errors raised by the fetch half of the protocol.
    pub fn is_fetch_error(&self) -> bool {
        !matches!(self, Self::NoFetchedConfig | Self::NoOpActivation)
    }
}

impl From<FetchFailure> for RemoteConfigError {
    fn from(failure: FetchFailure) -> Self {
        match failure {
            FetchFailure::Network(message) => Self::Network(message),
            FetchFailure::Server { status, message } => Self::Server { status, message },
            FetchFailure::Timeout(after) => Self::Timeout(after),
            FetchFailure::Throttled { retry_after } => Self::Throttled { retry_after },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_errors_report_internal_error_code() {
        assert_eq!(
            RemoteConfigError::NoOpActivation.code(),
            ErrorCode::InternalError
        );
        assert_eq!(
            RemoteConfigError::NoFetchedConfig.code(),
            ErrorCode::InternalError
        );
        assert_eq!(ErrorCode::InternalError.as_i32(), 8003);
    }

    #[test]
    fn fetch_failures_convert_verbatim() {
        let err: RemoteConfigError = FetchFailure::Server {
            status: 503,
            message: "unavailable".into(),
        }
        .into();
        assert_eq!(err.to_string(), "server error: status 503: unavailable");
        assert_eq!(err.code(), ErrorCode::Unknown);
        assert!(err.is_fetch_error());

        let throttled = RemoteConfigError::Throttled {
            retry_after: Duration::from_secs(5),
        };
        assert_eq!(throttled.code(), ErrorCode::Throttled);
        assert!(!RemoteConfigError::NoOpActivation.is_fetch_error());
    }
}
