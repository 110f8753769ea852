//! Verification oracle verdicts.

use serde::{Deserialize, Serialize};

/// Diagnostics reported for every check when the checker tool is absent.
pub const TOOL_NOT_INSTALLED: &str = "tool not installed";

/// Outcome of one verification oracle call.
///
/// Produced fresh on every call; only the latest result for an artifact
/// drives the next decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub passed: bool,
    pub diagnostics: String,
}

impl VerificationResult {
    pub fn pass(diagnostics: impl Into<String>) -> Self {
        Self {
            passed: true,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn fail(diagnostics: impl Into<String>) -> Self {
        Self {
            passed: false,
            diagnostics: diagnostics.into(),
        }
    }

    /// Uniform failure reported when the checker is not available.
    pub fn tool_not_installed() -> Self {
        Self::fail(TOOL_NOT_INSTALLED)
    }
}
