//! Status helpers exposing client health (last fetch, phase, versions) to
//! embedders that publish diagnostics as JSON.

use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::service::ActivationState;
use crate::throttle::FetchStatus;

/// Point-in-time view of a [`crate::RemoteConfig`] client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub last_fetch_status: FetchStatus,
    /// Wall-clock time of the last successful fetch.
    pub last_fetch_time: Option<OffsetDateTime>,
    pub state: ActivationState,
    /// Version token of the pending fetched snapshot, if any.
    pub fetched_version: Option<String>,
    /// Version token of the active snapshot.
    pub active_version: Option<String>,
    pub active_keys: usize,
    pub promotions: u64,
}

impl StatusSnapshot {
    /// Renders the snapshot as a flat JSON map.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "lastFetchStatus".into(),
            Value::String(self.last_fetch_status.as_str().to_string()),
        );
        map.insert(
            "lastFetchTime".into(),
            match self.last_fetch_time {
                Some(at) => Value::from(at.unix_timestamp()),
                None => Value::Null,
            },
        );
        map.insert("state".into(), Value::String(self.state.as_str().to_string()));
        map.insert("fetchedVersion".into(), optional_string(&self.fetched_version));
        map.insert("activeVersion".into(), optional_string(&self.active_version));
        map.insert("activeKeys".into(), Value::from(self.active_keys));
        map.insert("promotions".into(), Value::from(self.promotions));
        map
    }

    /// Wraps [`StatusSnapshot::to_map`] into a [`serde_json::Value`].
    pub fn to_json(&self) -> Value {
        Value::Object(self.to_map())
    }
}

fn optional_string(value: &Option<String>) -> Value {
    value
        .as_ref()
        .map(|v| Value::String(v.clone()))
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A client that never fetched renders nulls rather than omitting fields.
    #[test]
    fn idle_snapshot_renders_nulls() {
        let snapshot = StatusSnapshot {
            last_fetch_status: FetchStatus::NoFetchYet,
            last_fetch_time: None,
            state: ActivationState::Idle,
            fetched_version: None,
            active_version: None,
            active_keys: 0,
            promotions: 0,
        };
        let json = snapshot.to_json();
        assert_eq!(json["lastFetchStatus"], "no_fetch_yet");
        assert_eq!(json["state"], "idle");
        assert!(json["lastFetchTime"].is_null());
        assert!(json["fetchedVersion"].is_null());
        assert_eq!(json["activeKeys"], 0);
    }

    #[test]
    fn populated_snapshot_renders_all_fields() {
        let snapshot = StatusSnapshot {
            last_fetch_status: FetchStatus::Success,
            last_fetch_time: Some(OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()),
            state: ActivationState::Activated,
            fetched_version: Some("abc".into()),
            active_version: Some("abc".into()),
            active_keys: 2,
            promotions: 3,
        };
        let map = snapshot.to_map();
        assert_eq!(map.len(), 7);
        assert_eq!(map["lastFetchTime"], 1_700_000_000_i64);
        assert_eq!(map["activeVersion"], "abc");
        assert_eq!(map["promotions"], 3);
    }
}
