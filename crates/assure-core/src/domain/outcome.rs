//! Repair attempts and terminal sample outcomes.

use serde::{Deserialize, Serialize};

use crate::domain::artifact::Artifact;
use crate::domain::verification::VerificationResult;

/// One repair/re-verify cycle.
///
/// `attempt_index` is 1-based and never exceeds the attempt budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairAttempt {
    pub attempt_index: u32,
    pub input_artifact: String,
    pub diagnostics_supplied: String,
    /// `None` when the repair oracle returned nothing usable.
    pub output_artifact: Option<String>,
    /// `None` when there was no output to re-verify.
    pub verification: Option<VerificationResult>,
}

impl RepairAttempt {
    /// Whether the re-verification of this attempt's output passed.
    pub fn succeeded(&self) -> bool {
        self.verification.as_ref().is_some_and(|v| v.passed)
    }
}

/// Terminal status label used in audit logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleStatus {
    #[serde(rename = "pass_at_1")]
    PassAt1,
    #[serde(rename = "repaired")]
    Repaired,
    #[serde(rename = "failed")]
    Failed,
}

impl SampleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PassAt1 => "pass_at_1",
            Self::Repaired => "repaired",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal classification of one artifact. Created once per sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SampleOutcome {
    /// Verified on the first check; no repair requested.
    PassedFirstTry,

    /// A repair passed re-verification on attempt `attempts`.
    Repaired { attempts: u32, artifact: String },

    /// The attempt budget ran out without a passing artifact.
    Failed { attempts: u32, diagnostics: String },
}

impl SampleOutcome {
    pub fn status(&self) -> SampleStatus {
        match self {
            Self::PassedFirstTry => SampleStatus::PassAt1,
            Self::Repaired { .. } => SampleStatus::Repaired,
            Self::Failed { .. } => SampleStatus::Failed,
        }
    }

    /// Repair attempts consumed; zero for a first-try pass.
    pub fn attempts_used(&self) -> u32 {
        match self {
            Self::PassedFirstTry => 0,
            Self::Repaired { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn needed_repair(&self) -> bool {
        !matches!(self, Self::PassedFirstTry)
    }
}

/// Everything the sample processor learned about one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleReport {
    /// 1-based position of the sample within its batch.
    pub sample_index: usize,
    pub artifact: Artifact,
    pub initial: VerificationResult,
    pub attempts: Vec<RepairAttempt>,
    pub outcome: SampleOutcome,
}

impl SampleReport {
    /// Text of the artifact that passed, or was last verified.
    pub fn final_text(&self) -> &str {
        match &self.outcome {
            SampleOutcome::Repaired { artifact, .. } => artifact,
            _ => self
                .attempts
                .iter()
                .rev()
                .find_map(|a| a.output_artifact.as_deref())
                .unwrap_or(&self.artifact.text),
        }
    }
}
