//! Run orchestration.
//!
//! Discovers batches, drives every sample through the [`SampleProcessor`],
//! writes the per-batch audit log and repaired artifacts as samples finish,
//! then aggregates groups and writes the table.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::aggregate::GroupSummary;
use crate::discovery::{discover_batches, BatchDescriptor, BatchKey, Discovery};
use crate::domain::error::{AssureError, Result};
use crate::domain::outcome::SampleOutcome;
use crate::metrics::METRICS;
use crate::obs::{
    emit_batch_finished, emit_batch_skipped, emit_batch_started, emit_run_finished,
    emit_run_started, emit_sample_failed, emit_sample_pass_at_1, emit_sample_repaired, run_span,
};
use crate::processor::{RepairPolicy, SampleProcessor};
use crate::repair::RepairOracle;
use crate::report::{
    write_repaired_artifact, write_summary_json, write_table_csv, AuditLog, AuditRecord,
    SummaryArtifact, AUDIT_LOG_FILE,
};
use crate::verifier::VerificationOracle;

/// Output directory name under the results root.
pub const DEFAULT_OUT_DIR: &str = "validation_agent";

/// Table file name under the results root.
pub const DEFAULT_TABLE_FILE: &str = "table_E.csv";

/// Run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Attempt budget K.
    pub max_attempts: u32,

    /// Directory scanned for `gen_<model>_s<shots>` batches.
    pub results_root: PathBuf,

    /// Where `repaired_<batch>/` directories are created.
    pub out_root: PathBuf,

    /// CSV table path.
    pub out_csv: PathBuf,

    /// Optional JSON summary path.
    pub out_json: Option<PathBuf>,

    /// Samples in flight per batch.
    pub jobs: usize,

    pub require_marker: bool,
}

impl AgentConfig {
    /// Defaults with every output placed under `results_root`.
    pub fn new(results_root: impl Into<PathBuf>) -> Self {
        let results_root = results_root.into();
        Self {
            max_attempts: 3,
            out_root: results_root.join(DEFAULT_OUT_DIR),
            out_csv: results_root.join(DEFAULT_TABLE_FILE),
            out_json: None,
            jobs: 1,
            require_marker: false,
            results_root,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(AssureError::InvalidConfig(
                "jobs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn policy(&self) -> RepairPolicy {
        RepairPolicy {
            max_attempts: self.max_attempts,
            require_marker: self.require_marker,
        }
    }

    /// Output directory for one batch.
    pub fn batch_out_dir(&self, batch: &BatchDescriptor) -> PathBuf {
        self.out_root.join(format!("repaired_{}", batch.name))
    }
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    /// One entry per non-empty group, ordered by key.
    pub summaries: Vec<GroupSummary>,
    /// Batches dropped for layout problems or unwritable output.
    pub skipped: Vec<AssureError>,
    pub samples: usize,
}

/// Verifies and repairs every discovered sample, then reports per group.
pub struct ValidationAgent {
    processor: SampleProcessor,
    config: AgentConfig,
}

impl ValidationAgent {
    pub fn new(
        verifier: Arc<dyn VerificationOracle>,
        repairer: Arc<dyn RepairOracle>,
        config: AgentConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            processor: SampleProcessor::new(verifier, repairer, config.policy()),
            config,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Execute one full run.
    ///
    /// Oracle failures and per-batch output failures never surface here;
    /// only writing the table or summary can fail the run.
    pub async fn run(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        self.run_inner(run_id.clone())
            .instrument(run_span(&run_id))
            .await
    }

    async fn run_inner(&self, run_id: String) -> Result<RunReport> {
        let started = Instant::now();
        emit_run_started(
            &run_id,
            &self.config.results_root.display().to_string(),
            self.config.max_attempts,
        );

        let discovery = discover_batches(&self.config.results_root).unwrap_or_else(|error| {
            warn!(
                root = %self.config.results_root.display(),
                error = %error,
                "results root could not be scanned; no batches discovered"
            );
            Discovery::default()
        });
        let mut skipped = discovery.skipped;
        for error in &skipped {
            emit_batch_skipped(&error_batch_name(error), error);
        }

        let mut groups: BTreeMap<BatchKey, Vec<SampleOutcome>> = BTreeMap::new();
        let mut samples = 0;
        for batch in &discovery.batches {
            match self.run_batch(batch).await {
                Ok(outcomes) => {
                    samples += outcomes.len();
                    groups.entry(batch.key.clone()).or_default().extend(outcomes);
                }
                Err(error) => {
                    emit_batch_skipped(&batch.name, &error);
                    skipped.push(error);
                }
            }
        }

        let summaries: Vec<GroupSummary> = groups
            .iter()
            .map(|(key, outcomes)| GroupSummary::from_outcomes(key, outcomes))
            .filter(|summary| !summary.is_empty())
            .collect();

        write_table_csv(&self.config.out_csv, &summaries, self.config.max_attempts).await?;
        info!(path = %self.config.out_csv.display(), rows = summaries.len(), "wrote table");
        if let Some(path) = &self.config.out_json {
            let artifact = SummaryArtifact::new(&summaries, self.config.max_attempts);
            write_summary_json(path, &artifact).await?;
            info!(path = %path.display(), "wrote summary");
        }

        METRICS.flush();
        emit_run_finished(
            &run_id,
            started.elapsed().as_millis() as u64,
            summaries.len(),
            samples,
        );

        Ok(RunReport {
            run_id,
            summaries,
            skipped,
            samples,
        })
    }

    /// Process one batch.
    ///
    /// An error skips this batch only: a layout problem, or an audit log that
    /// cannot be written.
    async fn run_batch(&self, batch: &BatchDescriptor) -> Result<Vec<SampleOutcome>> {
        let artifacts = batch.load_artifacts()?;
        emit_batch_started(&batch.key.model, batch.key.shots, artifacts.len());

        let out_dir = self.config.batch_out_dir(batch);
        let mut log = AuditLog::create(&out_dir.join(AUDIT_LOG_FILE)).await?;

        let processor = &self.processor;
        let mut reports = futures::stream::iter(artifacts.into_iter().enumerate())
            .map(|(idx, artifact)| async move { processor.process(idx + 1, artifact).await })
            .buffered(self.config.jobs);

        let mut outcomes = Vec::new();
        while let Some(report) = reports.next().await {
            let key = &batch.key;
            let code_path = match &report.outcome {
                SampleOutcome::PassedFirstTry => {
                    emit_sample_pass_at_1(&key.model, key.shots, report.sample_index);
                    None
                }
                SampleOutcome::Repaired { attempts, artifact } => {
                    emit_sample_repaired(&key.model, key.shots, report.sample_index, *attempts);
                    match write_repaired_artifact(
                        &out_dir,
                        key,
                        report.sample_index,
                        *attempts,
                        artifact,
                    )
                    .await
                    {
                        Ok(path) => {
                            METRICS.inc_artifacts_written();
                            Some(path)
                        }
                        Err(error) => {
                            warn!(
                                batch = %batch.name,
                                sample = report.sample_index,
                                error = %error,
                                "repaired artifact could not be written"
                            );
                            None
                        }
                    }
                }
                SampleOutcome::Failed { attempts, .. } => {
                    emit_sample_failed(&key.model, key.shots, report.sample_index, *attempts);
                    None
                }
            };
            log.append(&AuditRecord::from_report(key, &report, code_path.as_deref()))
                .await?;
            outcomes.push(report.outcome);
        }

        let summary = GroupSummary::from_outcomes(&batch.key, &outcomes);
        emit_batch_finished(
            &batch.key.model,
            batch.key.shots,
            summary.pass_at_1() * 100.0,
            summary.final_pass_rate() * 100.0,
        );
        Ok(outcomes)
    }
}

fn error_batch_name(error: &AssureError) -> String {
    match error {
        AssureError::MalformedBatchLayout { path, .. } => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        other => other.to_string(),
    }
}

/// Audit log location for a batch directory name.
pub fn audit_log_path(config: &AgentConfig, batch_name: &str) -> PathBuf {
    config
        .out_root
        .join(format!("repaired_{batch_name}"))
        .join(AUDIT_LOG_FILE)
}
