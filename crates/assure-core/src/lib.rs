//! hdl-assure core library
//!
//! Compile assurance for generated hardware description artifacts: each
//! artifact is linted by an external checker, failures go through a bounded
//! repair loop against a generative repair oracle, and outcomes are reported
//! per (model, shots) group.

pub mod agent;
pub mod aggregate;
pub mod discovery;
pub mod domain;
pub mod extract;
pub mod fakes;
pub mod metrics;
pub mod obs;
pub mod processor;
pub mod repair;
pub mod report;
pub mod telemetry;
pub mod verifier;

pub use agent::{AgentConfig, RunReport, ValidationAgent};
pub use aggregate::GroupSummary;
pub use discovery::{discover_batches, parse_batch_name, BatchDescriptor, BatchKey, Discovery};
pub use domain::{
    Artifact, AssureError, ContentDigest, GenerationRecord, RepairAttempt, RepairCallError,
    Result, SampleOutcome, SampleReport, SampleStatus, VerificationResult,
};
pub use extract::{extract_code_block, CodeExtraction};
pub use processor::{RepairPolicy, SampleProcessor};
pub use repair::{ChatRepairOracle, RepairOracle, RepairOracleConfig};
pub use report::{
    render_table_csv, render_table_markdown, AuditLog, AuditRecord, SummaryArtifact,
};
pub use telemetry::init_tracing;
pub use verifier::{LintVerifier, VerificationOracle, VerifierConfig};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
