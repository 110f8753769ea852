//! Structured observability hooks for the validation run lifecycle.
//!
//! This module provides:
//! - The run-scoped span every event of a run is recorded under
//! - Emission functions for lifecycle events: run, batch, per-sample terminal
//!   states, and verifier availability
//!
//! Filter with `RUST_LOG`; pass `--json` to the CLI for JSON lines.

use tracing::{debug, info, warn};

/// Span tagged with the run id, meant for `Instrument::instrument`.
///
/// ```ignore
/// run_future.instrument(run_span("3f0c...")).await
/// // every event below carries run_id = "3f0c..."
/// ```
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("assure.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, results_root: &str, max_attempts: u32) {
    info!(
        event = "run.started",
        run_id = %run_id,
        results_root = %results_root,
        max_attempts = max_attempts,
    );
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, groups: usize, samples: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        groups = groups,
        samples = samples,
    );
}

/// Emitted once per run when the checker presence check fails.
pub fn emit_verifier_unavailable(binary: &str, reason: &str) {
    warn!(
        event = "verifier.unavailable",
        binary = %binary,
        reason = %reason,
        "all verifications will report failure",
    );
}

pub fn emit_batch_started(model: &str, shots: u32, samples: usize) {
    info!(event = "batch.started", model = %model, shots = shots, samples = samples);
}

/// A batch was dropped for a layout problem (warning level).
pub fn emit_batch_skipped(batch: &str, error: &dyn std::fmt::Display) {
    warn!(event = "batch.skipped", batch = %batch, error = %error);
}

pub fn emit_batch_finished(model: &str, shots: u32, pass_at_1_pct: f64, final_pass_pct: f64) {
    info!(
        event = "batch.finished",
        model = %model,
        shots = shots,
        pass_at_1_pct = pass_at_1_pct,
        final_pass_pct = final_pass_pct,
    );
}

pub fn emit_sample_pass_at_1(model: &str, shots: u32, sample_index: usize) {
    debug!(event = "sample.pass_at_1", model = %model, shots = shots, sample = sample_index);
}

pub fn emit_sample_repaired(model: &str, shots: u32, sample_index: usize, attempts: u32) {
    debug!(
        event = "sample.repaired",
        model = %model,
        shots = shots,
        sample = sample_index,
        attempts = attempts,
    );
}

pub fn emit_sample_failed(model: &str, shots: u32, sample_index: usize, attempts: u32) {
    debug!(
        event = "sample.failed",
        model = %model,
        shots = shots,
        sample = sample_index,
        attempts = attempts,
    );
}
