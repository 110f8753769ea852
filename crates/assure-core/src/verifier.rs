//! Verification oracle adapter.
//!
//! Wraps an external HDL lint tool (Verilator by default). Tool presence is
//! checked once at construction; when it is missing every check reports
//! [`TOOL_NOT_INSTALLED`](crate::domain::verification::TOOL_NOT_INSTALLED)
//! so a run with no checker produces visibly degenerate numbers.
//!
//! Each check stages the candidate in its own temporary directory, which is
//! removed when the check returns on every path.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::verification::VerificationResult;
use crate::metrics::METRICS;
use crate::obs::emit_verifier_unavailable;

/// Anything that can accept or reject an artifact.
#[async_trait]
pub trait VerificationOracle: Send + Sync {
    /// Check one artifact. Never fails: problems become a failing result.
    async fn verify(&self, artifact_text: &str) -> VerificationResult;
}

/// Configuration for the process-backed lint verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Checker executable.
    pub binary: String,

    /// Arguments for the presence check.
    pub presence_args: Vec<String>,

    /// Arguments preceding the staged file path on each check.
    pub lint_args: Vec<String>,

    /// Upper bound on the presence check.
    pub presence_timeout: Duration,

    /// Upper bound on one check.
    pub check_timeout: Duration,

    /// Retry a check once when the checker crashes or times out.
    pub retry_on_crash: bool,

    /// File name the candidate is staged under.
    pub file_name: String,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            binary: "verilator".to_string(),
            presence_args: vec!["--version".to_string()],
            lint_args: vec!["--lint-only".to_string(), "-Wall".to_string()],
            presence_timeout: Duration::from_secs(10),
            check_timeout: Duration::from_secs(60),
            retry_on_crash: true,
            file_name: "module.v".to_string(),
        }
    }
}

impl VerifierConfig {
    /// Default Verilator configuration with a different executable.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ..Default::default()
        }
    }
}

/// How one checker invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CheckRun {
    Completed { passed: bool, diagnostics: String },
    Crashed(String),
}

/// Verifier that shells out to an external lint tool.
#[derive(Debug, Clone)]
pub struct LintVerifier {
    config: VerifierConfig,
    available: bool,
}

impl LintVerifier {
    /// Check that the checker is present and build a verifier.
    ///
    /// A missing, failing, or hanging presence check marks the tool
    /// unavailable. This is reported once here rather than on every check.
    pub async fn detect(config: VerifierConfig) -> Self {
        let status = tokio::time::timeout(
            config.presence_timeout,
            Command::new(&config.binary)
                .args(&config.presence_args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status(),
        )
        .await;

        let available = match status {
            Ok(Ok(status)) if status.success() => true,
            Ok(Ok(status)) => {
                emit_verifier_unavailable(&config.binary, &format!("presence check exited with {status}"));
                false
            }
            Ok(Err(e)) => {
                emit_verifier_unavailable(&config.binary, &e.to_string());
                false
            }
            Err(_) => {
                emit_verifier_unavailable(
                    &config.binary,
                    &format!("presence check timed out after {:?}", config.presence_timeout),
                );
                false
            }
        };

        Self { config, available }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    async fn run_once(&self, staged: &Path) -> CheckRun {
        let child = Command::new(&self.config.binary)
            .args(&self.config.lint_args)
            .arg(staged)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => return CheckRun::Crashed(format!("failed to spawn checker: {e}")),
        };

        let output =
            match tokio::time::timeout(self.config.check_timeout, child.wait_with_output()).await {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => return CheckRun::Crashed(format!("checker i/o error: {e}")),
                Err(_) => {
                    return CheckRun::Crashed(format!(
                        "checker timed out after {:?}",
                        self.config.check_timeout
                    ))
                }
            };

        // Killed by a signal: no exit code.
        if output.status.code().is_none() {
            return CheckRun::Crashed(format!("checker terminated abnormally: {}", output.status));
        }

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let diagnostics = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).into_owned()
        } else {
            stderr
        };

        CheckRun::Completed {
            passed: output.status.success(),
            diagnostics,
        }
    }
}

#[async_trait]
impl VerificationOracle for LintVerifier {
    async fn verify(&self, artifact_text: &str) -> VerificationResult {
        METRICS.inc_verifications();

        if !self.available {
            return VerificationResult::tool_not_installed();
        }

        let scratch = tokio::task::spawn_blocking(|| {
            tempfile::Builder::new().prefix("hdl-assure-").tempdir()
        })
        .await;
        let scratch = match scratch {
            Ok(Ok(dir)) => dir,
            Ok(Err(e)) => {
                return VerificationResult::fail(format!("scratch allocation failed: {e}"))
            }
            Err(e) => return VerificationResult::fail(format!("scratch allocation panicked: {e}")),
        };
        let staged = scratch.path().join(&self.config.file_name);
        if let Err(e) = tokio::fs::write(&staged, artifact_text).await {
            return VerificationResult::fail(format!("scratch staging failed: {e}"));
        }

        let mut run = self.run_once(&staged).await;
        if let CheckRun::Crashed(reason) = &run {
            if self.config.retry_on_crash {
                warn!(binary = %self.config.binary, reason = %reason, "checker crashed; retrying once");
                run = self.run_once(&staged).await;
            }
        }

        match tokio::task::spawn_blocking(move || scratch.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "scratch cleanup failed"),
            Err(e) => warn!(error = %e, "scratch cleanup did not finish"),
        }

        match run {
            CheckRun::Completed {
                passed,
                diagnostics,
            } => {
                debug!(passed, "check completed");
                VerificationResult {
                    passed,
                    diagnostics,
                }
            }
            CheckRun::Crashed(reason) => VerificationResult::fail(format!("checker crashed: {reason}")),
        }
    }
}
