//! Audit log, repaired artifacts, and the final group table.
//!
//! Output artifacts:
//! - `agent_log.jsonl` per batch, one line per completed sample, appended
//!   and flushed as samples finish
//! - repaired artifacts named from (model, shots, sample, attempt)
//! - a CSV table with one row per non-empty group, plus an optional JSON
//!   summary and a Markdown rendering for terminal output

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::aggregate::GroupSummary;
use crate::discovery::BatchKey;
use crate::domain::digest::ContentDigest;
use crate::domain::error::Result;
use crate::domain::outcome::{SampleOutcome, SampleReport, SampleStatus};

/// Per-batch audit log file name.
pub const AUDIT_LOG_FILE: &str = "agent_log.jsonl";

/// Schema version of the JSON summary artifact.
pub const SUMMARY_SCHEMA_VERSION: &str = "1.0";

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub model: String,
    pub shots: u32,
    pub sample_index: usize,
    pub target: String,
    pub status: SampleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    /// Repaired artifact location; only for `repaired`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_path: Option<String>,
    pub artifact_digest: ContentDigest,
    /// Latest diagnostics; only for `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn from_report(key: &BatchKey, report: &SampleReport, code_path: Option<&Path>) -> Self {
        let (attempts, diagnostics) = match &report.outcome {
            SampleOutcome::PassedFirstTry => (None, None),
            SampleOutcome::Repaired { attempts, .. } => (Some(*attempts), None),
            SampleOutcome::Failed {
                attempts,
                diagnostics,
            } => (Some(*attempts), Some(diagnostics.clone())),
        };

        Self {
            model: key.model.clone(),
            shots: key.shots,
            sample_index: report.sample_index,
            target: report.artifact.target.clone(),
            status: report.outcome.status(),
            attempts,
            code_path: code_path.map(|p| p.to_string_lossy().into_owned()),
            artifact_digest: ContentDigest::from_bytes(report.final_text().as_bytes()),
            diagnostics,
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only JSONL writer for one batch.
///
/// Each record is written and flushed before `append` returns, so an
/// interrupted run leaves every completed sample on disk.
pub struct AuditLog {
    file: tokio::fs::File,
}

impl AuditLog {
    /// Start a fresh log at `path`, replacing one left by an earlier run.
    pub async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .await?;
        Ok(Self { file })
    }

    pub async fn append(&mut self, record: &AuditRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file.write_all(&line).await?;
        self.file.flush().await?;
        Ok(())
    }
}

/// Read every record from an audit log.
pub fn read_audit_log(path: &Path) -> Result<Vec<AuditRecord>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| Ok(serde_json::from_str(l)?))
        .collect()
}

/// `<model>_s<shots>_<sample>_attempt<n>_repaired.v`
pub fn repaired_artifact_name(key: &BatchKey, sample_index: usize, attempt: u32) -> String {
    format!(
        "{}_s{}_{}_attempt{}_repaired.v",
        key.model, key.shots, sample_index, attempt
    )
}

/// Persist a repaired artifact under `dir` and return its path.
pub async fn write_repaired_artifact(
    dir: &Path,
    key: &BatchKey,
    sample_index: usize,
    attempt: u32,
    text: &str,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(repaired_artifact_name(key, sample_index, attempt));
    tokio::fs::write(&path, text).await?;
    Ok(path)
}

/// Column headers of the group table.
pub fn table_header(max_attempts: u32) -> [String; 7] {
    [
        "Model".to_string(),
        "Shots".to_string(),
        "#Inputs".to_string(),
        "Compile Pass@1 (%)".to_string(),
        format!("Agent Repair Success@≤{max_attempts} (%)"),
        "Final Compile Pass (%)".to_string(),
        "Mean Attempts".to_string(),
    ]
}

/// One formatted table row. Percentages to 1 decimal, mean attempts to 2.
pub fn table_row(summary: &GroupSummary) -> [String; 7] {
    [
        summary.model.clone(),
        summary.shots.to_string(),
        summary.input_count.to_string(),
        format!("{:.1}", summary.pass_at_1() * 100.0),
        format!("{:.1}", summary.repair_success_rate() * 100.0),
        format!("{:.1}", summary.final_pass_rate() * 100.0),
        format!("{:.2}", summary.mean_attempts()),
    ]
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_line(fields: &[String]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str("\r\n");
    line
}

/// Render the CSV table. Empty groups produce no row.
pub fn render_table_csv(summaries: &[GroupSummary], max_attempts: u32) -> String {
    let mut out = csv_line(&table_header(max_attempts));
    for summary in summaries.iter().filter(|s| !s.is_empty()) {
        out.push_str(&csv_line(&table_row(summary)));
    }
    out
}

/// Write the CSV table, creating parent directories.
pub async fn write_table_csv(
    path: &Path,
    summaries: &[GroupSummary],
    max_attempts: u32,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, render_table_csv(summaries, max_attempts)).await?;
    Ok(())
}

/// Render the group table as Markdown.
pub fn render_table_markdown(summaries: &[GroupSummary], max_attempts: u32) -> String {
    let header = table_header(max_attempts);
    let mut out = format!("| {} |\n", header.join(" | "));
    out.push_str(&format!("|{}\n", "---|".repeat(header.len())));
    for summary in summaries.iter().filter(|s| !s.is_empty()) {
        out.push_str(&format!("| {} |\n", table_row(summary).join(" | ")));
    }
    out
}

/// One group in the JSON summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupSummaryArtifact {
    #[serde(flatten)]
    pub counts: GroupSummary,
    pub pass_at_1_pct: f64,
    pub repair_success_pct: f64,
    pub final_pass_pct: f64,
    pub mean_attempts: f64,
}

impl From<&GroupSummary> for GroupSummaryArtifact {
    fn from(summary: &GroupSummary) -> Self {
        Self {
            counts: summary.clone(),
            pass_at_1_pct: summary.pass_at_1() * 100.0,
            repair_success_pct: summary.repair_success_rate() * 100.0,
            final_pass_pct: summary.final_pass_rate() * 100.0,
            mean_attempts: summary.mean_attempts(),
        }
    }
}

/// Machine-readable run summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub max_attempts: u32,
    pub groups: Vec<GroupSummaryArtifact>,
}

impl SummaryArtifact {
    pub fn new(summaries: &[GroupSummary], max_attempts: u32) -> Self {
        Self {
            schema_version: SUMMARY_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            max_attempts,
            groups: summaries
                .iter()
                .filter(|s| !s.is_empty())
                .map(GroupSummaryArtifact::from)
                .collect(),
        }
    }
}

/// Write the summary in pretty JSON format.
pub async fn write_summary_json(path: &Path, artifact: &SummaryArtifact) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(artifact)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}
