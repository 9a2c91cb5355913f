//! Fixtures shared by the integration tests.

use std::sync::Arc;
use std::time::Duration;

use remote_config_client::{FakeTransport, RemoteConfig, RemoteConfigSettings};

/// Backend payload used by the activation scenarios.
pub const KEY: &str = "Key1";

/// Client and backend pair with throttling disabled.
pub fn unthrottled_client() -> (RemoteConfig, Arc<FakeTransport>) {
    client_with_interval(Duration::ZERO)
}

pub fn client_with_interval(interval: Duration) -> (RemoteConfig, Arc<FakeTransport>) {
    let transport = Arc::new(FakeTransport::new());
    let settings = RemoteConfigSettings {
        minimum_fetch_interval: interval,
        ..RemoteConfigSettings::default()
    };
    (RemoteConfig::new(transport.clone(), settings), transport)
}

/// Active string value for `key`, if any.
pub fn active_string(client: &RemoteConfig, key: &str) -> Option<String> {
    client.get(key).map(|value| value.to_string_value())
}
