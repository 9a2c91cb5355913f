//! Client settings and environment-driven helpers to build them.
//!
//! Defaults follow the mobile SDKs: a twelve hour minimum fetch interval and
//! a one minute fetch timeout. A minimum interval of zero turns throttling
//! off, which is what hermetic tests use.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use tracing::warn;

/// Environment variable overriding the minimum fetch interval (seconds).
const ENV_MINIMUM_FETCH_INTERVAL: &str = "REMOTE_CONFIG_MINIMUM_FETCH_INTERVAL";
/// Environment variable overriding the fetch timeout (seconds).
const ENV_FETCH_TIMEOUT: &str = "REMOTE_CONFIG_FETCH_TIMEOUT";
/// Environment variable selecting the configuration namespace.
const ENV_NAMESPACE: &str = "REMOTE_CONFIG_NAMESPACE";

/// Default minimum interval between two network fetches.
pub const DEFAULT_MINIMUM_FETCH_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);
/// Default upper bound on a single fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);
/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "firebase";

/// Settings controlling fetch throttling and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfigSettings {
    /// Minimum time between two successful network fetches; zero disables throttling.
    pub minimum_fetch_interval: Duration,
    /// Maximum duration of one fetch before it fails with a timeout.
    pub fetch_timeout: Duration,
    /// Namespace forwarded to the transport.
    pub namespace: String,
}

impl Default for RemoteConfigSettings {
    fn default() -> Self {
        Self {
            minimum_fetch_interval: DEFAULT_MINIMUM_FETCH_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl RemoteConfigSettings {
    /// Settings with throttling disabled, as used by tests and forced refreshes.
    pub fn unthrottled() -> Self {
        Self {
            minimum_fetch_interval: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Builds settings from the current process environment.
    pub fn from_os_env() -> Self {
        Self::from_env_iter(env::vars())
    }

    /// Builds settings from an iterator of key/value pairs (typically for tests).
    ///
    /// Unparsable values fall back to the defaults.
    pub fn from_env_iter<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let minimum_fetch_interval = parse_seconds(
            map.get(ENV_MINIMUM_FETCH_INTERVAL).map(String::as_str),
            DEFAULT_MINIMUM_FETCH_INTERVAL,
        );
        let fetch_timeout = parse_seconds(
            map.get(ENV_FETCH_TIMEOUT).map(String::as_str),
            DEFAULT_FETCH_TIMEOUT,
        );
        let namespace = map
            .get(ENV_NAMESPACE)
            .and_then(|value| sanitize_non_empty(value))
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        Self {
            minimum_fetch_interval,
            fetch_timeout,
            namespace,
        }
        .sanitise()
    }

    /// Replaces values the client cannot operate with.
    pub fn sanitise(mut self) -> Self {
        if self.fetch_timeout.is_zero() {
            warn!(
                "remote-config: fetch timeout must be > 0; using {:?}",
                DEFAULT_FETCH_TIMEOUT
            );
            self.fetch_timeout = DEFAULT_FETCH_TIMEOUT;
        }
        if self.namespace.trim().is_empty() {
            warn!("remote-config: empty namespace; using '{DEFAULT_NAMESPACE}'");
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }
        self
    }
}

/// Helper trimming whitespace and discarding empty values.
fn sanitize_non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parses a whole or fractional number of seconds, falling back to `default`.
fn parse_seconds(value: Option<&str>, default: Duration) -> Duration {
    match value.map(str::trim) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(secs) => match Duration::try_from_secs_f64(secs) {
                Ok(duration) => duration,
                Err(_) => {
                    warn!("remote-config: ignoring out-of-range duration '{raw}'; using {default:?}");
                    default
                }
            },
            Err(_) => {
                warn!("remote-config: ignoring invalid duration '{raw}'; using {default:?}");
                default
            }
        },
        None => default,
    }
}
