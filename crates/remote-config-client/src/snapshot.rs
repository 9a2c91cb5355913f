//! Immutable configuration snapshots and the values they carry.
//!
//! A [`ConfigSnapshot`] is never mutated once built: the store replaces
//! snapshots wholesale, sharing them behind an `Arc` so readers can hold on to
//! a consistent view for as long as they need.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Single configuration value as delivered by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Number(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl ConfigValue {
    /// Returns the string payload when the value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the numeric payload when the value is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the boolean payload when the value is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the raw bytes when the value is binary.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }

    /// Renders the value the way hosts read it as a plain string.
    ///
    /// Binary payloads are decoded lossily as UTF-8.
    pub fn to_string_value(&self) -> String {
        match self {
            Self::String(value) => value.clone(),
            Self::Number(value) => value.to_string(),
            Self::Bool(value) => value.to_string(),
            Self::Bytes(value) => String::from_utf8_lossy(value).into_owned(),
        }
    }
}

// NaN compares equal to itself so an unchanged NaN never reads as a change.
impl PartialEq for ConfigValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConfigValue {}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_value())
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for ConfigValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Versioned key/value payload retrieved from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    entries: BTreeMap<String, ConfigValue>,
    version: Option<String>,
    fetched_at: OffsetDateTime,
}

impl ConfigSnapshot {
    /// Builds a snapshot from its parts.
    pub fn new(
        entries: BTreeMap<String, ConfigValue>,
        version: Option<String>,
        fetched_at: OffsetDateTime,
    ) -> Self {
        Self {
            entries,
            version,
            fetched_at,
        }
    }

    /// Builds a snapshot stamped now whose version is derived from the entries.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ConfigValue>,
    {
        let entries: BTreeMap<String, ConfigValue> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let version = content_version(&entries);
        Self::new(entries, Some(version), OffsetDateTime::now_utc())
    }

    /// Snapshot with no entries and no version, used as the initial active config.
    pub fn empty() -> Self {
        Self::new(BTreeMap::new(), None, OffsetDateTime::UNIX_EPOCH)
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> &BTreeMap<String, ConfigValue> {
        &self.entries
    }

    /// Keys in lexicographic order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Version/ETag token reported for this payload, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Wall-clock time at which the payload was retrieved.
    pub fn fetched_at(&self) -> OffsetDateTime {
        self.fetched_at
    }

    /// Structural comparison of the key/value mappings.
    ///
    /// Version tokens are ignored: two snapshots carrying the same mapping are
    /// the same configuration regardless of what the backend tagged them with.
    pub fn same_entries(&self, other: &ConfigSnapshot) -> bool {
        self.entries == other.entries
    }
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Derives a version token from the payload contents.
///
/// The token is the hex SHA-256 of the key-sorted JSON rendering, so equal
/// mappings always produce equal tokens.
pub fn content_version(entries: &BTreeMap<String, ConfigValue>) -> String {
    // BTreeMap serialises in key order, which keeps the rendering canonical.
    let canonical = serde_json::to_vec(entries).unwrap_or_default();
    compute_sha256(&canonical)
}

/// Computes the hexadecimal SHA-256 digest for the provided payload.
pub(crate) fn compute_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
