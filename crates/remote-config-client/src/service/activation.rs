//! Activation state machine and its two completion contracts.
//!
//! Both contracts run the same [`ConfigStore::promote`] call and only differ
//! in how they translate its [`Promotion`]:
//!
//! * the modern contract reports `changed` and never fails;
//! * the legacy contract reports success only when the promotion changed the
//!   active mapping or was the first one the store performed, and an
//!   internal error otherwise.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::RemoteConfigError;
use crate::store::{ConfigStore, Promotion};

/// Observable phase of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    /// Nothing fetched or activated yet.
    Idle,
    /// At least one fetch is in flight.
    Fetching,
    /// A fetched snapshot is waiting to be activated.
    Fetched,
    /// A promotion is running.
    Activating,
    /// The latest fetched snapshot is active.
    Activated,
}

impl ActivationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Fetched => "fetched",
            Self::Activating => "activating",
            Self::Activated => "activated",
        }
    }
}

/// Translates a promotion into the modern `(changed, error)` contract.
///
/// The error side is always empty: a promotion with nothing to promote simply
/// did not change anything.
pub fn modern_result(promotion: &Promotion) -> Result<bool, RemoteConfigError> {
    Ok(promotion.changed && promotion.error.is_none())
}

/// Translates a promotion into the legacy error-only contract.
pub fn legacy_result(promotion: &Promotion) -> Result<(), RemoteConfigError> {
    if let Some(error) = &promotion.error {
        return Err(error.clone());
    }
    if promotion.changed || promotion.first_promotion {
        Ok(())
    } else {
        Err(RemoteConfigError::NoOpActivation)
    }
}

/// Decrements the in-flight fetch counter when dropped.
#[derive(Debug)]
pub(crate) struct FetchInFlight<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for FetchInFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Orchestrates promotion of the fetched snapshot and tracks the client phase.
#[derive(Debug)]
pub struct Activator {
    store: Arc<ConfigStore>,
    fetches_in_flight: AtomicUsize,
    activations_in_flight: AtomicUsize,
}

impl Activator {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            fetches_in_flight: AtomicUsize::new(0),
            activations_in_flight: AtomicUsize::new(0),
        }
    }

    /// Marks a fetch as in flight until the returned guard is dropped.
    pub(crate) fn fetch_started(&self) -> FetchInFlight<'_> {
        self.fetches_in_flight.fetch_add(1, Ordering::SeqCst);
        FetchInFlight {
            counter: &self.fetches_in_flight,
        }
    }

    /// Runs one promotion. Shared by both completion contracts.
    pub fn promote(&self) -> Promotion {
        self.activations_in_flight.fetch_add(1, Ordering::SeqCst);
        let promotion = self.store.promote();
        self.activations_in_flight.fetch_sub(1, Ordering::SeqCst);
        debug!(
            "remote-config: promotion finished (changed: {}, first: {}, error: {:?})",
            promotion.changed, promotion.first_promotion, promotion.error
        );
        promotion
    }

    /// Current phase derived from in-flight work and the store slots.
    pub fn state(&self) -> ActivationState {
        if self.fetches_in_flight.load(Ordering::SeqCst) > 0 {
            ActivationState::Fetching
        } else if self.activations_in_flight.load(Ordering::SeqCst) > 0 {
            ActivationState::Activating
        } else if self.store.has_pending() {
            ActivationState::Fetched
        } else if self.store.promotion_count() > 0 {
            ActivationState::Activated
        } else {
            ActivationState::Idle
        }
    }
}
