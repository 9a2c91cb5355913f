//! Public entry points for the remote-config client crate.
//!
//! The crate fetches key/value configuration from a remote backend into a
//! pending slot and promotes it to the active one on demand. Backend traffic
//! is throttled by a minimum fetch interval. Hosts interact with
//! [`RemoteConfig`]; the remaining modules are re-exported for embedders that
//! want to plug in their own transport or observe client health.

pub mod config;
pub mod error;
pub mod service;
pub mod snapshot;
pub mod status;
pub mod store;
pub mod telemetry;
pub mod throttle;
pub mod transport;

pub use config::RemoteConfigSettings;
pub use error::{ErrorCode, RemoteConfigError};
pub use service::{
    ActivationState, FetchAndActivateStatus, FetchSource, RemoteConfig, RemoteConfigTelemetry,
    RemoteConfigValue,
};
pub use snapshot::{ConfigSnapshot, ConfigValue};
pub use status::StatusSnapshot;
pub use store::{ConfigStore, ValueSource};
pub use telemetry::{CompositeTelemetry, CountingTelemetry, TelemetryCounters, TelemetrySnapshot};
pub use throttle::FetchStatus;
pub use transport::{FakeTransport, RetrieveRequest, Transport, TransportError, TransportResponse};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Ensures hosts can build and drive a client through the crate root.
    #[tokio::test]
    async fn client_types_are_reexported() {
        let transport = Arc::new(FakeTransport::with_config([("Key1", "Value1")]));
        let client = RemoteConfig::new(transport, RemoteConfigSettings::unthrottled());
        assert_eq!(
            client.fetch_and_activate().await,
            Ok(FetchAndActivateStatus::SuccessFetchedFromRemote)
        );
        assert_eq!(
            client.value("Key1").value.as_ref().and_then(ConfigValue::as_str),
            Some("Value1")
        );
    }

    /// Verifies the status helpers exported at the crate root remain usable.
    #[test]
    fn status_helpers_work_via_reexports() {
        let transport = Arc::new(FakeTransport::new());
        let client = RemoteConfig::new(transport, RemoteConfigSettings::default());
        let json = client.status().to_json();
        assert_eq!(
            json.get("lastFetchStatus").and_then(|v| v.as_str()),
            Some("no_fetch_yet")
        );
        assert_eq!(client.status().state, ActivationState::Idle);
    }
}
