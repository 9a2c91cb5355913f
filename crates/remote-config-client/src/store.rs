//! Two-slot configuration store: *fetched* (pending) and *active* (visible).
//!
//! Readers of the active snapshot go through an [`ArcSwap`] and never block;
//! promotion of the fetched snapshot is serialised so the changed flag is
//! always computed against a stable pair.
//!
//! Overlapping fetches are ordered by the sequence number handed out by
//! [`ConfigStore::begin_fetch`]: the fetched slot only accepts a snapshot from
//! a fetch issued after the one it currently holds, so the last-issued fetch
//! wins regardless of completion order.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use tracing::debug;

use crate::error::RemoteConfigError;
use crate::snapshot::{ConfigSnapshot, ConfigValue};

/// Where a value returned to the host came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// The active remote configuration.
    Remote,
    /// In-app defaults.
    Default,
    /// Neither; the key is unknown.
    Static,
}

/// Result of a single promotion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    /// Whether the active key/value mapping changed.
    pub changed: bool,
    /// Set when there was nothing to promote.
    pub error: Option<RemoteConfigError>,
    /// `true` when this was the first promotion the store ever performed.
    pub first_promotion: bool,
}

#[derive(Debug, Default)]
struct FetchedSlot {
    snapshot: Option<Arc<ConfigSnapshot>>,
    sequence: u64,
    /// Latest fetch whose not-modified answer vouched for the held snapshot.
    confirmed: u64,
}

/// Holds the fetched, active, and default configuration of one client.
#[derive(Debug)]
pub struct ConfigStore {
    active: ArcSwap<ConfigSnapshot>,
    defaults: ArcSwap<BTreeMap<String, ConfigValue>>,
    fetched: Mutex<FetchedSlot>,
    promote_lock: Mutex<()>,
    next_sequence: AtomicU64,
    promoted_sequence: AtomicU64,
    promotions: AtomicU64,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    /// Creates a store with an empty active snapshot and nothing fetched.
    pub fn new() -> Self {
        Self {
            active: ArcSwap::from_pointee(ConfigSnapshot::empty()),
            defaults: ArcSwap::from_pointee(BTreeMap::new()),
            fetched: Mutex::new(FetchedSlot::default()),
            promote_lock: Mutex::new(()),
            next_sequence: AtomicU64::new(0),
            promoted_sequence: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
        }
    }

    fn fetched_slot(&self) -> MutexGuard<'_, FetchedSlot> {
        self.fetched.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands out the sequence number for a fetch being issued now.
    pub fn begin_fetch(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Looks up `key` in the active snapshot without blocking.
    pub fn get_active(&self, key: &str) -> Option<ConfigValue> {
        self.active.load().get(key).cloned()
    }

    /// Returns the whole active snapshot for consistent multi-key reads.
    pub fn active(&self) -> Arc<ConfigSnapshot> {
        self.active.load_full()
    }

    /// Returns the pending fetched snapshot, if any.
    pub fn fetched(&self) -> Option<Arc<ConfigSnapshot>> {
        self.fetched_slot().snapshot.clone()
    }

    /// Replaces the fetched snapshot if `sequence` was issued after the one held.
    ///
    /// Returns whether the snapshot was accepted.
    pub fn set_fetched(&self, snapshot: ConfigSnapshot, sequence: u64) -> bool {
        let mut slot = self.fetched_slot();
        let newest = slot.sequence.max(slot.confirmed);
        if sequence <= newest {
            debug!("remote-config: discarding fetch #{sequence}; slot is current as of fetch #{newest}");
            return false;
        }
        slot.snapshot = Some(Arc::new(snapshot));
        slot.sequence = sequence;
        true
    }

    /// Records that fetch `sequence` found the held snapshot current, so no
    /// earlier-issued fetch may replace it.
    pub fn confirm_fetched(&self, sequence: u64) {
        let mut slot = self.fetched_slot();
        slot.confirmed = slot.confirmed.max(sequence);
    }

    /// Returns `true` when a fetched snapshot was accepted after the last promotion.
    pub fn has_pending(&self) -> bool {
        let slot = self.fetched_slot();
        slot.snapshot.is_some() && slot.sequence > self.promoted_sequence.load(Ordering::SeqCst)
    }

    /// Number of promotions performed so far.
    pub fn promotion_count(&self) -> u64 {
        self.promotions.load(Ordering::SeqCst)
    }

    /// Atomically makes the fetched snapshot the active one.
    ///
    /// Never fails once something has been fetched: promoting the same data
    /// again simply reports `changed == false`.
    pub fn promote(&self) -> Promotion {
        let _serialised = self
            .promote_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let (fetched, sequence) = {
            let slot = self.fetched_slot();
            (slot.snapshot.clone(), slot.sequence)
        };
        let first_promotion = self.promotions.load(Ordering::SeqCst) == 0;
        let Some(fetched) = fetched else {
            return Promotion {
                changed: false,
                error: Some(RemoteConfigError::NoFetchedConfig),
                first_promotion,
            };
        };

        let previous = self.active.load();
        let changed = !fetched.same_entries(&previous);
        self.active.store(fetched);
        self.promoted_sequence.store(sequence, Ordering::SeqCst);
        self.promotions.fetch_add(1, Ordering::SeqCst);
        Promotion {
            changed,
            error: None,
            first_promotion,
        }
    }

    /// Replaces the in-app defaults.
    pub fn set_defaults(&self, defaults: BTreeMap<String, ConfigValue>) {
        self.defaults.store(Arc::new(defaults));
    }

    pub fn default_value(&self, key: &str) -> Option<ConfigValue> {
        self.defaults.load().get(key).cloned()
    }

    /// Resolves `key` against the active snapshot, then the defaults.
    pub fn value(&self, key: &str) -> Option<(ConfigValue, ValueSource)> {
        if let Some(value) = self.get_active(key) {
            return Some((value, ValueSource::Remote));
        }
        self.default_value(key)
            .map(|value| (value, ValueSource::Default))
    }

    /// Sorted keys known to `source`.
    pub fn keys(&self, source: ValueSource) -> Vec<String> {
        match source {
            ValueSource::Remote => self.active.load().keys().map(str::to_owned).collect(),
            ValueSource::Default => self.defaults.load().keys().cloned().collect(),
            ValueSource::Static => Vec::new(),
        }
    }
}
