//! Global atomic counters for run observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    verifications: AtomicU64,
    repair_calls: AtomicU64,
    empty_repairs: AtomicU64,
    artifacts_written: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            verifications: AtomicU64::new(0),
            repair_calls: AtomicU64::new(0),
            empty_repairs: AtomicU64::new(0),
            artifacts_written: AtomicU64::new(0),
        }
    }

    /// One verification oracle call completed.
    pub fn inc_verifications(&self) {
        self.verifications.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "verifications", "counter incremented");
    }

    /// One repair oracle call completed, whatever it returned.
    pub fn inc_repair_calls(&self) {
        self.repair_calls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "repair_calls", "counter incremented");
    }

    /// A repair oracle call yielded no usable artifact.
    pub fn inc_empty_repairs(&self) {
        self.empty_repairs.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "empty_repairs", "counter incremented");
    }

    /// A repaired artifact was persisted.
    pub fn inc_artifacts_written(&self) {
        self.artifacts_written.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "artifacts_written", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            verifications = self.verifications(),
            repair_calls = self.repair_calls(),
            empty_repairs = self.empty_repairs(),
            artifacts_written = self.artifacts_written(),
        );
    }

    pub fn verifications(&self) -> u64 {
        self.verifications.load(Ordering::Relaxed)
    }

    pub fn repair_calls(&self) -> u64 {
        self.repair_calls.load(Ordering::Relaxed)
    }

    pub fn empty_repairs(&self) -> u64 {
        self.empty_repairs.load(Ordering::Relaxed)
    }

    pub fn artifacts_written(&self) -> u64 {
        self.artifacts_written.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.verifications.store(0, Ordering::Relaxed);
        self.repair_calls.store(0, Ordering::Relaxed);
        self.empty_repairs.store(0, Ordering::Relaxed);
        self.artifacts_written.store(0, Ordering::Relaxed);
    }
}
