//! hdl-assure - compile assurance CLI
//!
//! ## Commands
//!
//! - `run`: verify every generated artifact under a results root, repair
//!   failures, and write the per-group table
//! - `verify`: lint a single file with the configured checker

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use assure_core::repair::DEFAULT_ENDPOINT;
use assure_core::{
    extract_code_block, render_table_markdown, AgentConfig, ChatRepairOracle, CodeExtraction,
    LintVerifier, RepairOracleConfig, ValidationAgent, VerificationOracle, VerifierConfig,
};

#[derive(Parser)]
#[command(name = "hdl-assure")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile assurance for generated Verilog", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify, repair and tabulate every generation batch
    Run(RunArgs),

    /// Lint one file and print the checker's verdict
    Verify {
        /// Verilog file (a fenced code block inside it is extracted)
        file: PathBuf,

        /// Checker executable
        #[arg(long, default_value = "verilator")]
        verifier_bin: String,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Repair attempt budget per sample
    #[arg(long = "k", default_value_t = 3)]
    k: u32,

    /// Directory holding gen_<model>_s<shots> batches
    #[arg(long, default_value = "results")]
    results_root: PathBuf,

    /// Output directory for audit logs and repaired files
    /// (default: <results-root>/validation_agent)
    #[arg(long)]
    out_root: Option<PathBuf>,

    /// CSV table path (default: <results-root>/table_E.csv)
    #[arg(long)]
    out_csv: Option<PathBuf>,

    /// Also write a JSON summary here
    #[arg(long)]
    out_json: Option<PathBuf>,

    /// Samples processed concurrently within a batch
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// Reject repairs that drop the `// CWE: <target>` marker
    #[arg(long)]
    require_marker: bool,

    /// Checker executable
    #[arg(long, default_value = "verilator")]
    verifier_bin: String,

    /// Repair model name
    #[arg(long, default_value = "gpt-4o")]
    repair_model: String,

    /// Chat-completions endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    repair_endpoint: String,

    /// Repair oracle credential (overrides OPENAI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,
}

impl RunArgs {
    fn agent_config(&self) -> AgentConfig {
        let defaults = AgentConfig::new(&self.results_root);
        AgentConfig {
            max_attempts: self.k,
            out_root: self.out_root.clone().unwrap_or(defaults.out_root.clone()),
            out_csv: self.out_csv.clone().unwrap_or(defaults.out_csv.clone()),
            out_json: self.out_json.clone(),
            jobs: self.jobs,
            require_marker: self.require_marker,
            ..defaults
        }
    }

    fn repair_config(&self) -> RepairOracleConfig {
        let config = RepairOracleConfig {
            endpoint: self.repair_endpoint.clone(),
            model: self.repair_model.clone(),
            ..RepairOracleConfig::from_env()
        };
        match self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => config.with_api_key(key),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    assure_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => cmd_run(&args).await,
        Commands::Verify { file, verifier_bin } => cmd_verify(&file, &verifier_bin).await,
    }
}

async fn cmd_run(args: &RunArgs) -> Result<()> {
    let config = args.agent_config();
    let verifier = LintVerifier::detect(VerifierConfig::with_binary(&args.verifier_bin)).await;
    let repairer = ChatRepairOracle::new(args.repair_config());

    let agent = ValidationAgent::new(Arc::new(verifier), Arc::new(repairer), config)
        .context("Invalid run configuration")?;
    let report = agent.run().await.context("Validation run failed")?;

    println!(
        "{}",
        render_table_markdown(&report.summaries, agent.config().max_attempts)
    );
    println!("Wrote table to {}", agent.config().out_csv.display());
    if let Some(path) = &agent.config().out_json {
        println!("Wrote summary to {}", path.display());
    }
    if !report.skipped.is_empty() {
        println!("Skipped {} batch(es):", report.skipped.len());
        for error in &report.skipped {
            println!("  {error}");
        }
    }

    info!(run_id = %report.run_id, samples = report.samples, "run complete");
    Ok(())
}

async fn cmd_verify(file: &Path, verifier_bin: &str) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let code = match extract_code_block(&text) {
        CodeExtraction::Code(code) => code,
        CodeExtraction::Malformed => bail!("{} contains no code", file.display()),
    };

    let verifier = LintVerifier::detect(VerifierConfig::with_binary(verifier_bin)).await;
    let result = verifier.verify(&code).await;

    if result.passed {
        println!("PASS {}", file.display());
        Ok(())
    } else {
        println!("FAIL {}", file.display());
        if !result.diagnostics.trim().is_empty() {
            println!("{}", result.diagnostics.trim_end());
        }
        bail!("verification failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).expect("parse");
        match cli.command {
            Commands::Run(args) => args,
            Commands::Verify { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_defaults() {
        let args = run_args(&["hdl-assure", "run"]);
        let config = args.agent_config();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.results_root, PathBuf::from("results"));
        assert_eq!(config.out_root, PathBuf::from("results/validation_agent"));
        assert_eq!(config.out_csv, PathBuf::from("results/table_E.csv"));
        assert_eq!(config.jobs, 1);
        assert!(!config.require_marker);

        let repair = args.repair_config();
        assert_eq!(repair.model, "gpt-4o");
        assert_eq!(repair.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_run_overrides() {
        let args = run_args(&[
            "hdl-assure",
            "--verbose",
            "run",
            "--k",
            "5",
            "--results-root",
            "/data/results",
            "--out-csv",
            "/tmp/table.csv",
            "--out-json",
            "/tmp/summary.json",
            "--jobs",
            "4",
            "--require-marker",
            "--repair-model",
            "gpt-4o-mini",
            "--api-key",
            "sk-test",
        ]);
        let config = args.agent_config();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.out_root, PathBuf::from("/data/results/validation_agent"));
        assert_eq!(config.out_csv, PathBuf::from("/tmp/table.csv"));
        assert_eq!(config.out_json, Some(PathBuf::from("/tmp/summary.json")));
        assert_eq!(config.jobs, 4);
        assert!(config.require_marker);

        let repair = args.repair_config();
        assert_eq!(repair.model, "gpt-4o-mini");
        assert_eq!(repair.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_blank_api_key_flag_is_ignored() {
        let args = run_args(&["hdl-assure", "run", "--api-key", "  "]);
        let repair = args.repair_config();
        let from_env = RepairOracleConfig::from_env();
        assert_eq!(repair.api_key, from_env.api_key);
    }

    #[test]
    fn test_verify_parses_file() {
        let cli = Cli::try_parse_from(["hdl-assure", "--json", "verify", "top.v"]).expect("parse");
        assert!(cli.json);
        match cli.command {
            Commands::Verify { file, verifier_bin } => {
                assert_eq!(file, PathBuf::from("top.v"));
                assert_eq!(verifier_bin, "verilator");
            }
            Commands::Run(_) => panic!("expected verify"),
        }
    }

    #[tokio::test]
    async fn test_cmd_verify_without_tool_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("top.v");
        std::fs::write(&file, "module top; endmodule\n").unwrap();

        let result = cmd_verify(&file, "hdl-assure-no-such-checker").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cmd_run_on_empty_root_writes_header_only_table() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let args = run_args(&[
            "hdl-assure",
            "run",
            "--results-root",
            root,
            "--verifier-bin",
            "hdl-assure-no-such-checker",
        ]);

        cmd_run(&args).await.unwrap();

        let csv = std::fs::read_to_string(dir.path().join("table_E.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("Model,Shots,#Inputs"));
    }
}
