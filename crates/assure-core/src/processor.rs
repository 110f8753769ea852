//! Per-sample verify/repair state machine.
//!
//! ```text
//! UNVERIFIED -> VERIFIED_PASS                      => PassedFirstTry
//!            -> VERIFIED_FAIL -> REPAIR_REQUESTED
//! REPAIR_REQUESTED -> REPAIRED_EMPTY               -> next attempt | Failed
//!                  -> REPAIRED_NONEMPTY -> RE-VERIFIED_PASS => Repaired
//!                                       -> RE-VERIFIED_FAIL -> next attempt | Failed
//! ```
//!
//! Attempts are immutable [`RepairAttempt`] records; the input of attempt
//! `n + 1` is derived from record `n` alone.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::artifact::{contains_marker, Artifact};
use crate::domain::outcome::{RepairAttempt, SampleOutcome, SampleReport};
use crate::domain::verification::VerificationResult;
use crate::repair::RepairOracle;
use crate::verifier::VerificationOracle;

/// Bounded repair policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairPolicy {
    /// Attempt budget K.
    pub max_attempts: u32,

    /// Reject repairs that drop the target marker comment the original had.
    pub require_marker: bool,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            require_marker: false,
        }
    }
}

/// Candidate and diagnostics for the next repair request.
///
/// An empty repair carries its own input and diagnostics forward unchanged.
fn next_request<'a>(
    artifact: &'a Artifact,
    initial: &'a VerificationResult,
    previous: Option<&'a RepairAttempt>,
) -> (&'a str, &'a str) {
    match previous {
        None => (&artifact.text, &initial.diagnostics),
        Some(RepairAttempt {
            output_artifact: Some(output),
            verification: Some(verification),
            ..
        }) => (output, &verification.diagnostics),
        Some(prev) => (&prev.input_artifact, &prev.diagnostics_supplied),
    }
}

/// Drives one artifact to a terminal [`SampleOutcome`].
#[derive(Clone)]
pub struct SampleProcessor {
    verifier: Arc<dyn VerificationOracle>,
    repairer: Arc<dyn RepairOracle>,
    policy: RepairPolicy,
}

impl SampleProcessor {
    pub fn new(
        verifier: Arc<dyn VerificationOracle>,
        repairer: Arc<dyn RepairOracle>,
        policy: RepairPolicy,
    ) -> Self {
        Self {
            verifier,
            repairer,
            policy,
        }
    }

    /// Re-verify a repair, applying the marker post-condition when enabled.
    ///
    /// The marker requirement is relative to the original artifact.
    async fn reverify(&self, original: &Artifact, output: &str) -> VerificationResult {
        let result = self.verifier.verify(output).await;
        if !self.policy.require_marker || !result.passed {
            return result;
        }
        if original.has_marker() && !contains_marker(output, &original.target) {
            let marker = original.marker().unwrap_or_default();
            return VerificationResult::fail(format!(
                "target marker `{marker}` was not preserved by the repair"
            ));
        }
        result
    }

    /// Verify `artifact`, repairing it up to the attempt budget on failure.
    pub async fn process(&self, sample_index: usize, artifact: Artifact) -> SampleReport {
        let initial = self.verifier.verify(&artifact.text).await;
        if initial.passed {
            return SampleReport {
                sample_index,
                artifact,
                initial,
                attempts: Vec::new(),
                outcome: SampleOutcome::PassedFirstTry,
            };
        }

        let mut attempts: Vec<RepairAttempt> = Vec::new();
        for attempt_index in 1..=self.policy.max_attempts {
            let (input, diagnostics) = next_request(&artifact, &initial, attempts.last());
            let (input, diagnostics) = (input.to_string(), diagnostics.to_string());

            let output = self
                .repairer
                .repair(&input, &diagnostics, &artifact.target)
                .await
                .filter(|text| !text.trim().is_empty());

            let verification = match &output {
                Some(text) => Some(self.reverify(&artifact, text).await),
                None => None,
            };

            debug!(
                sample = sample_index,
                attempt = attempt_index,
                empty = output.is_none(),
                passed = verification.as_ref().is_some_and(|v| v.passed),
                "repair attempt finished"
            );

            let attempt = RepairAttempt {
                attempt_index,
                input_artifact: input,
                diagnostics_supplied: diagnostics,
                output_artifact: output,
                verification,
            };

            if attempt.succeeded() {
                let repaired = attempt.output_artifact.clone().unwrap_or_default();
                attempts.push(attempt);
                return SampleReport {
                    sample_index,
                    artifact,
                    initial,
                    attempts,
                    outcome: SampleOutcome::Repaired {
                        attempts: attempt_index,
                        artifact: repaired,
                    },
                };
            }
            attempts.push(attempt);
        }

        let diagnostics = match attempts.last() {
            Some(RepairAttempt {
                verification: Some(v),
                ..
            }) => v.diagnostics.clone(),
            Some(last) => last.diagnostics_supplied.clone(),
            None => initial.diagnostics.clone(),
        };

        SampleReport {
            sample_index,
            artifact,
            initial,
            attempts,
            outcome: SampleOutcome::Failed {
                attempts: self.policy.max_attempts,
                diagnostics,
            },
        }
    }
}
