//! Repair oracle adapter.
//!
//! Sends a failing artifact and its (bounded) diagnostics to an
//! OpenAI-compatible chat-completions endpoint and extracts the proposed
//! replacement. Every failure mode collapses to "no repair": callers see
//! `None`, never an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::artifact::target_marker;
use crate::domain::error::RepairCallError;
use crate::extract::{extract_code_block, CodeExtraction};
use crate::metrics::METRICS;

/// Environment variable holding the repair oracle credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default OpenAI chat-completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Anything that can propose a repaired artifact.
#[async_trait]
pub trait RepairOracle: Send + Sync {
    /// Propose a replacement for `current`.
    ///
    /// `None` means no usable repair was produced; it is never an error.
    async fn repair(&self, current: &str, diagnostics: &str, target: &str) -> Option<String>;
}

/// Configuration for [`ChatRepairOracle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOracleConfig {
    /// Bearer credential. Absent means every repair is empty.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,

    /// Diagnostics are cut to this many characters, keeping the head.
    pub max_diagnostic_chars: usize,

    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for RepairOracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            max_tokens: 1200,
            max_diagnostic_chars: 1500,
            timeout: Duration::from_secs(120),
        }
    }
}

impl RepairOracleConfig {
    /// Defaults plus the credential from [`API_KEY_ENV`], if set and non-empty.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Keep at most `max_chars` characters from the head of `diagnostics`.
///
/// Lint errors are front-loaded, so the tail is what gets dropped.
pub fn truncate_diagnostics(diagnostics: &str, max_chars: usize) -> &str {
    match diagnostics.char_indices().nth(max_chars) {
        Some((idx, _)) => &diagnostics[..idx],
        None => diagnostics,
    }
}

/// System instruction: minimal edits, keep the marker, one code block.
pub fn repair_system_prompt(target: &str) -> String {
    let marker = target_marker(target).unwrap_or_else(|| "// CWE: <target>".to_string());
    format!(
        "You are a senior Verilog engineer. Fix compile/lint errors only. \
         Preserve the vulnerability and the top comment `{marker}` if present. \
         Make the minimal necessary edits. \
         Return exactly one fenced Verilog code block and no prose."
    )
}

/// User message carrying the artifact and already-truncated diagnostics.
pub fn repair_user_prompt(current: &str, diagnostics: &str) -> String {
    format!(
        "Original code:\n```verilog\n{current}\n```\n\n\
         Verilator errors (trimmed):\n{diagnostics}\n\n\
         Return the repaired code as a single Verilog code block."
    )
}

/// Pull the proposed code out of a chat-completions response body.
pub fn parse_chat_response(body: &str) -> Result<CodeExtraction, RepairCallError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| RepairCallError::MalformedResponse(e.to_string()))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| RepairCallError::MalformedResponse("no choices".to_string()))?
        .message
        .content
        .unwrap_or_default();
    Ok(extract_code_block(&content))
}

/// Repair oracle backed by an OpenAI-compatible chat endpoint.
#[derive(Debug, Clone)]
pub struct ChatRepairOracle {
    config: RepairOracleConfig,
    http_client: reqwest::Client,
}

impl ChatRepairOracle {
    /// Build the adapter. Succeeds without a credential; repairs are then empty.
    pub fn new(config: RepairOracleConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("hdl-assure/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();

        if config.api_key.is_none() {
            warn!(
                event = "repair.credential_missing",
                env = API_KEY_ENV,
                "repair oracle has no credential; every repair will be empty"
            );
        }

        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &RepairOracleConfig {
        &self.config
    }

    /// One request/response cycle with typed failures.
    pub async fn try_repair(
        &self,
        current: &str,
        diagnostics: &str,
        target: &str,
    ) -> Result<CodeExtraction, RepairCallError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(RepairCallError::MissingCredential)?;

        let diagnostics = truncate_diagnostics(diagnostics, self.config.max_diagnostic_chars);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: repair_system_prompt(target),
                },
                Message {
                    role: "user".to_string(),
                    content: repair_user_prompt(current, diagnostics),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RepairCallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_chat_response(&body)
    }
}

#[async_trait]
impl RepairOracle for ChatRepairOracle {
    async fn repair(&self, current: &str, diagnostics: &str, target: &str) -> Option<String> {
        METRICS.inc_repair_calls();
        let proposal = match self.try_repair(current, diagnostics, target).await {
            Ok(CodeExtraction::Code(code)) => Some(code),
            Ok(CodeExtraction::Malformed) => {
                debug!("repair response contained no code");
                None
            }
            Err(RepairCallError::MissingCredential) => None,
            Err(e) => {
                warn!(event = "repair.call_failed", error = %e);
                None
            }
        };
        if proposal.is_none() {
            METRICS.inc_empty_repairs();
        }
        proposal
    }
}
