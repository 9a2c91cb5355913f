//! Remote configuration service module facade.
//!
//! This module re-exports the host-facing client and wires the fetch and
//! activation submodules behind it.

pub(crate) mod activation;
mod core;
pub(crate) mod fetch;
pub(crate) mod telemetry;
#[cfg(test)]
pub(crate) mod test_support;

pub use activation::{legacy_result, modern_result, ActivationState};
pub use core::*;
pub use fetch::{FetchFailure, FetchOutcome, FetchPolicy};
pub use telemetry::RemoteConfigTelemetry;
