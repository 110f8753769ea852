//! Generation batch discovery.
//!
//! A batch is a directory `gen_<model>_s<shots>` under the results root
//! holding a `gen.jsonl` generation log. The directory name is parsed once
//! into a [`BatchKey`]; nothing downstream looks at the name again.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::artifact::{Artifact, GenerationRecord};
use crate::domain::error::{AssureError, Result};

/// Generation log file expected inside each batch directory.
pub const GEN_LOG_FILE: &str = "gen.jsonl";

/// Grouping key: generating model and few-shot count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchKey {
    pub model: String,
    pub shots: u32,
}

impl std::fmt::Display for BatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_s{}", self.model, self.shots)
    }
}

fn batch_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^gen_(.+)_s(\d+)$").expect("batch name pattern is valid"))
}

/// Parse `gen_<model>_s<shots>`. The last `_s<digits>` suffix is the shot count.
pub fn parse_batch_name(name: &str) -> Option<BatchKey> {
    let caps = batch_name_re().captures(name)?;
    let model = caps.get(1)?.as_str().to_string();
    let shots = caps.get(2)?.as_str().parse().ok()?;
    Some(BatchKey { model, shots })
}

/// A discovered batch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDescriptor {
    pub key: BatchKey,
    /// Directory name, used to name the batch's output directory.
    pub name: String,
    pub dir: PathBuf,
}

impl BatchDescriptor {
    pub fn gen_log(&self) -> PathBuf {
        self.dir.join(GEN_LOG_FILE)
    }

    /// Parse every record of the generation log.
    ///
    /// Blank lines are ignored; any other unparseable line makes the whole
    /// batch malformed.
    pub fn load_records(&self) -> Result<Vec<GenerationRecord>> {
        let path = self.gen_log();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| AssureError::malformed_batch(&path, format!("unreadable: {e}")))?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str::<GenerationRecord>(line).map_err(|e| {
                    AssureError::malformed_batch(&path, format!("line {}: {e}", idx + 1))
                })
            })
            .collect()
    }

    /// Load records and resolve each to its artifact, in log order.
    pub fn load_artifacts(&self) -> Result<Vec<Artifact>> {
        Ok(self
            .load_records()?
            .iter()
            .map(|rec| rec.resolve(&self.dir))
            .collect())
    }
}

/// Outcome of scanning a results root.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Well-formed batches, sorted by directory name.
    pub batches: Vec<BatchDescriptor>,
    /// Batch-shaped directories that were skipped.
    pub skipped: Vec<AssureError>,
}

/// Scan `root` for batch directories.
///
/// Directories whose names do not parse are not batches and are ignored.
/// A batch directory without a generation log is recorded as skipped.
/// A missing root yields no batches.
pub fn discover_batches(root: &Path) -> Result<Discovery> {
    let mut discovery = Discovery::default();
    if !root.is_dir() {
        warn!(root = %root.display(), "results root does not exist; no batches discovered");
        return Ok(discovery);
    }

    let mut entries: Vec<(String, PathBuf)> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            Some((name, path))
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, dir) in entries {
        let Some(key) = parse_batch_name(&name) else {
            debug!(dir = %name, "not a batch directory");
            continue;
        };
        if !dir.join(GEN_LOG_FILE).is_file() {
            discovery.skipped.push(AssureError::malformed_batch(
                &dir,
                format!("missing {GEN_LOG_FILE}"),
            ));
            continue;
        }
        discovery.batches.push(BatchDescriptor { key, name, dir });
    }

    Ok(discovery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_batch_name() {
        assert_eq!(
            parse_batch_name("gen_gpt4o_s2"),
            Some(BatchKey {
                model: "gpt4o".to_string(),
                shots: 2
            })
        );
        assert_eq!(
            parse_batch_name("gen_claude-3.5_haiku_s8").map(|k| k.model),
            Some("claude-3.5_haiku".to_string())
        );
        assert_eq!(
            parse_batch_name("gen_model_s1_s4"),
            Some(BatchKey {
                model: "model_s1".to_string(),
                shots: 4
            })
        );
    }

    #[test]
    fn test_parse_batch_name_rejects_non_batches() {
        assert_eq!(parse_batch_name("validation_agent"), None);
        assert_eq!(parse_batch_name("gen_gpt4o"), None);
        assert_eq!(parse_batch_name("gen__s2"), None);
        assert_eq!(parse_batch_name("gen_gpt4o_sx"), None);
    }

    #[test]
    fn test_batch_key_display() {
        let key = BatchKey {
            model: "gpt4o".to_string(),
            shots: 4,
        };
        assert_eq!(key.to_string(), "gpt4o_s4");
    }

    #[test]
    fn test_discover_sorted_and_skips_missing_log() {
        let root = tempdir().expect("tempdir");
        for name in ["gen_b_s4", "gen_a_s2", "gen_c_s8", "notes", "validation_agent"] {
            std::fs::create_dir(root.path().join(name)).expect("mkdir");
        }
        std::fs::write(root.path().join("gen_b_s4").join(GEN_LOG_FILE), "").expect("write");
        std::fs::write(root.path().join("gen_a_s2").join(GEN_LOG_FILE), "").expect("write");
        std::fs::write(root.path().join("gen_z_s1"), "a file, not a dir").expect("write");

        let discovery = discover_batches(root.path()).expect("discover");
        let names: Vec<&str> = discovery.batches.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["gen_a_s2", "gen_b_s4"]);
        assert_eq!(discovery.skipped.len(), 1);
        assert!(discovery.skipped[0].to_string().contains("gen_c_s8"));
    }

    #[test]
    fn test_discover_missing_root_is_empty() {
        let root = tempdir().expect("tempdir");
        let discovery = discover_batches(&root.path().join("absent")).expect("discover");
        assert!(discovery.batches.is_empty());
        assert!(discovery.skipped.is_empty());
    }

    #[test]
    fn test_load_records_skips_blank_lines() {
        let root = tempdir().expect("tempdir");
        let dir = root.path().join("gen_m_s2");
        std::fs::create_dir(&dir).expect("mkdir");
        std::fs::write(
            dir.join(GEN_LOG_FILE),
            "{\"cwe_target\":\"CWE-1\",\"raw\":\"module a; endmodule\"}\n\n{\"cwe_target\":\"CWE-2\",\"raw\":\"module b;\"}\n",
        )
        .expect("write");

        let batch = BatchDescriptor {
            key: parse_batch_name("gen_m_s2").expect("key"),
            name: "gen_m_s2".to_string(),
            dir,
        };
        let artifacts = batch.load_artifacts().expect("load");
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].target, "CWE-1");
        assert_eq!(artifacts[1].text, "module b;");
    }

    #[test]
    fn test_load_records_malformed_line() {
        let root = tempdir().expect("tempdir");
        let dir = root.path().join("gen_m_s2");
        std::fs::create_dir(&dir).expect("mkdir");
        std::fs::write(dir.join(GEN_LOG_FILE), "{\"raw\":\"ok\"}\nnot json\n").expect("write");

        let batch = BatchDescriptor {
            key: parse_batch_name("gen_m_s2").expect("key"),
            name: "gen_m_s2".to_string(),
            dir,
        };
        let err = batch.load_records().expect_err("malformed");
        assert!(matches!(err, AssureError::MalformedBatchLayout { .. }));
        assert!(err.to_string().contains("line 2"));
    }
}
