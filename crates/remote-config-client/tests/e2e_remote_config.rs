//! End-to-end tests driving the client through full fetch/activate cycles
//! against the in-memory backend.

mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::fixtures::{active_string, client_with_interval, unthrottled_client, KEY};
use remote_config_client::{
    ActivationState, CompositeTelemetry, CountingTelemetry, ErrorCode, FetchAndActivateStatus,
    FetchSource, FetchStatus, RemoteConfigError, TransportError,
};

/// Fetch, activate, update the console, fetch and activate again.
#[tokio::test]
async fn console_update_round_trip() {
    let (client, backend) = unthrottled_client();
    backend.set_config([(KEY, "Value1")]);

    assert_eq!(client.fetch().await, Ok(FetchSource::Remote));
    assert_eq!(client.activate(), Ok(true));
    assert_eq!(active_string(&client, KEY).as_deref(), Some("Value1"));

    assert_eq!(client.fetch().await, Ok(FetchSource::NotModified));
    assert_eq!(client.activate(), Ok(false));

    backend.set_config([(KEY, "Value2")]);
    assert_eq!(client.fetch().await, Ok(FetchSource::Remote));
    assert_eq!(
        active_string(&client, KEY).as_deref(),
        Some("Value1"),
        "fetch alone must not change the active config"
    );
    assert_eq!(client.activate_legacy(), Ok(()));
    assert_eq!(active_string(&client, KEY).as_deref(), Some("Value2"));
    assert_eq!(client.state(), ActivationState::Activated);
}

/// The legacy contract errors on a repeated no-op activation only.
#[tokio::test]
async fn legacy_contract_flags_repeated_activation() {
    let (client, backend) = unthrottled_client();
    backend.set_config([(KEY, "Value1")]);

    assert_eq!(
        client.fetch_and_activate().await,
        Ok(FetchAndActivateStatus::SuccessFetchedFromRemote)
    );
    let err = client.fetch_and_activate().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InternalError);
    assert_eq!(err.code().as_i32(), 8003);
    assert_eq!(active_string(&client, KEY).as_deref(), Some("Value1"));
}

/// Backend outages surface as errors and keep serving the last active config.
#[tokio::test]
async fn outage_keeps_last_active_config() {
    let (client, backend) = unthrottled_client();
    let counting = CountingTelemetry::default();
    client.set_telemetry(Arc::new(
        CompositeTelemetry::new().with_observer(Arc::new(counting.clone())),
    ));
    backend.set_config([(KEY, "Value1")]);
    client.fetch_and_activate().await.unwrap();

    backend.set_config([(KEY, "Value2")]);
    backend.fail_with(TransportError::Network("connection refused".into()));
    let err = client.fetch_and_activate().await.unwrap_err();
    assert_eq!(err, RemoteConfigError::Network("connection refused".into()));
    assert_eq!(err.code(), ErrorCode::Unknown);
    assert_eq!(client.last_fetch_status(), FetchStatus::Failure);
    assert_eq!(active_string(&client, KEY).as_deref(), Some("Value1"));

    backend.recover();
    assert_eq!(
        client.fetch_and_activate().await,
        Ok(FetchAndActivateStatus::SuccessFetchedFromRemote)
    );
    assert_eq!(active_string(&client, KEY).as_deref(), Some("Value2"));

    let snapshot = counting.counters().snapshot();
    assert_eq!(snapshot.fetch_remote, 2);
    assert_eq!(snapshot.fetch_error, 1);
    assert_eq!(snapshot.activate_changed, 2);
}

/// Zero interval never throttles; a positive interval only contacts the
/// backend once per window.
#[tokio::test(start_paused = true)]
async fn throttle_gate_limits_backend_traffic() {
    let (open, open_backend) = unthrottled_client();
    open_backend.set_config([(KEY, "Value1")]);
    for _ in 0..5 {
        open.fetch().await.unwrap();
    }
    assert_eq!(open_backend.request_count(), 5);

    let (gated, gated_backend) = client_with_interval(Duration::from_secs(300));
    gated_backend.set_config([(KEY, "Value1")]);
    for _ in 0..5 {
        gated.fetch().await.unwrap();
    }
    assert_eq!(gated_backend.request_count(), 1);

    tokio::time::advance(Duration::from_secs(301)).await;
    gated.fetch().await.unwrap();
    assert_eq!(gated_backend.request_count(), 2);
}

/// Concurrent readers only ever observe complete snapshots, and never an
/// older one after a newer one.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_see_whole_snapshots_during_activation() {
    let (client, backend) = unthrottled_client();
    let stop = Arc::new(AtomicBool::new(false));

    let mut readers = Vec::new();
    for _ in 0..4 {
        let client = client.clone();
        let stop = stop.clone();
        readers.push(tokio::task::spawn_blocking(move || {
            let mut last_seen = 0_u32;
            while !stop.load(Ordering::Relaxed) {
                let a = client.get("a").and_then(|v| v.as_f64());
                let b = client.get("b").and_then(|v| v.as_f64());
                let status_keys = client.status().active_keys;
                if let (Some(a), Some(b)) = (a, b) {
                    // Separate reads: b comes from the same or a later generation.
                    assert!(b >= a);
                    let generation = a as u32;
                    assert!(generation >= last_seen, "active config rolled back");
                    last_seen = generation;
                }
                assert!(status_keys == 0 || status_keys == 2);
            }
            last_seen
        }));
    }

    for generation in 1..=50_i64 {
        backend.set_config([("a", generation), ("b", generation)]);
        client.fetch().await.unwrap();
        assert_eq!(client.activate(), Ok(true));
    }
    stop.store(true, Ordering::Relaxed);

    let mut observed = HashSet::new();
    for reader in readers {
        observed.insert(reader.await.unwrap());
    }
    assert!(observed.iter().all(|generation| *generation <= 50));
    assert_eq!(client.get("a").and_then(|v| v.as_f64()), Some(50.0));
}
