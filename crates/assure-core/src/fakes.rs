//! In-memory oracle fakes (testing only)
//!
//! Provides `FakeVerifier` and `ScriptedRepairer`, which satisfy the oracle
//! traits without any external tool or network access and record every call
//! they receive.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::verification::VerificationResult;
use crate::repair::RepairOracle;
use crate::verifier::VerificationOracle;

type Acceptor = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Verifier driven by a predicate over the artifact text.
pub struct FakeVerifier {
    accept: Option<Acceptor>,
    calls: Mutex<Vec<String>>,
}

impl FakeVerifier {
    /// Passes exactly the texts `accept` returns `true` for.
    ///
    /// Rejections carry `%Error: rejected <first line>` as diagnostics.
    pub fn accepting<F>(accept: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            accept: Some(Box::new(accept)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Behaves like a verifier whose tool is not installed.
    pub fn unavailable() -> Self {
        Self {
            accept: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every text this verifier was asked to check, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl VerificationOracle for FakeVerifier {
    async fn verify(&self, artifact_text: &str) -> VerificationResult {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(artifact_text.to_string());

        match &self.accept {
            None => VerificationResult::tool_not_installed(),
            Some(accept) if accept(artifact_text) => VerificationResult::pass(""),
            Some(_) => VerificationResult::fail(format!(
                "%Error: rejected {}",
                artifact_text.lines().next().unwrap_or("")
            )),
        }
    }
}

/// One call received by [`ScriptedRepairer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairCall {
    pub current: String,
    pub diagnostics: String,
    pub target: String,
}

/// Repairer that replays a fixed queue of responses, then returns `None`.
#[derive(Default)]
pub struct ScriptedRepairer {
    responses: Mutex<VecDeque<Option<String>>>,
    calls: Mutex<Vec<RepairCall>>,
}

impl ScriptedRepairer {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| r.map(Into::into)).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Never produces a repair, like an oracle without credentials.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RepairCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl RepairOracle for ScriptedRepairer {
    async fn repair(&self, current: &str, diagnostics: &str, target: &str) -> Option<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RepairCall {
                current: current.to_string(),
                diagnostics: diagnostics.to_string(),
                target: target.to_string(),
            });
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_verifier_records_calls() {
        let verifier = FakeVerifier::accepting(|t| t.contains("endmodule"));
        assert!(verifier.verify("module m; endmodule").await.passed);
        let rejected = verifier.verify("module m;").await;
        assert!(!rejected.passed);
        assert_eq!(rejected.diagnostics, "%Error: rejected module m;");
        assert_eq!(verifier.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_repairer_replays_then_empties() {
        let repairer = ScriptedRepairer::new([Some("a"), None]);
        assert_eq!(repairer.repair("x", "d", "t").await.as_deref(), Some("a"));
        assert_eq!(repairer.repair("x", "d", "t").await, None);
        assert_eq!(repairer.repair("x", "d", "t").await, None);
        assert_eq!(repairer.calls().len(), 3);
    }
}
