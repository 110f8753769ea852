//! Generated artifacts and the generation records that reference them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::extract::{extract_code_block, CodeExtraction};

/// One line of a batch's `gen.jsonl`.
///
/// Only the fields compile assurance needs are modelled; anything else the
/// generator recorded is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Vulnerability class the artifact is supposed to exhibit.
    #[serde(default)]
    pub cwe_target: Option<String>,

    /// Path of the stored artifact text.
    #[serde(default)]
    pub code_path: Option<String>,

    /// Raw model output, used when the stored artifact is missing.
    #[serde(default)]
    pub raw: Option<String>,
}

impl GenerationRecord {
    /// Locate the stored artifact: as given first, then relative to `batch_dir`.
    pub fn stored_path(&self, batch_dir: &Path) -> Option<PathBuf> {
        let code_path = self.code_path.as_deref().filter(|p| !p.is_empty())?;
        let direct = PathBuf::from(code_path);
        if direct.is_file() {
            return Some(direct);
        }
        if direct.is_relative() {
            let joined = batch_dir.join(&direct);
            if joined.is_file() {
                return Some(joined);
            }
            if let Some(name) = direct.file_name() {
                let sibling = batch_dir.join(name);
                if sibling.is_file() {
                    return Some(sibling);
                }
            }
        }
        None
    }

    /// Resolve the artifact text, falling back to the raw model output.
    ///
    /// Fenced text is reduced to its code block. An unreadable or missing
    /// stored file is not an error: the raw output stands in for it.
    pub fn resolve(&self, batch_dir: &Path) -> Artifact {
        let stored = self
            .stored_path(batch_dir)
            .and_then(|p| std::fs::read_to_string(p).ok());
        let text = stored.or_else(|| self.raw.clone()).unwrap_or_default();

        let text = if text.contains("```") {
            match extract_code_block(&text) {
                CodeExtraction::Code(code) => code,
                CodeExtraction::Malformed => String::new(),
            }
        } else {
            text
        };

        Artifact::new(text, self.cwe_target.clone().unwrap_or_default())
    }
}

/// One generated candidate under evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub text: String,
    pub target: String,
}

impl Artifact {
    pub fn new(text: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target: target.into(),
        }
    }

    /// The marker comment naming this artifact's target, if it has one.
    pub fn marker(&self) -> Option<String> {
        target_marker(&self.target)
    }

    /// Whether `self.text` carries the target marker comment.
    pub fn has_marker(&self) -> bool {
        contains_marker(&self.text, &self.target)
    }

    /// Same target, new text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self::new(text, self.target.clone())
    }
}

/// `// CWE: <target>` for a non-empty target.
pub fn target_marker(target: &str) -> Option<String> {
    let target = target.trim();
    if target.is_empty() {
        None
    } else {
        Some(format!("// CWE: {target}"))
    }
}

/// Whether any line of `text` carries the marker comment for `target`.
///
/// The marker must end the line or be followed by whitespace, so
/// `// CWE: CWE-12345` does not count as the marker for `CWE-1234`.
pub fn contains_marker(text: &str, target: &str) -> bool {
    let Some(marker) = target_marker(target) else {
        return false;
    };
    text.lines().any(|line| {
        line.trim_start()
            .strip_prefix(marker.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_record_deserializes_with_extra_fields() {
        let line = r#"{"cwe_target":"CWE-1234","shots":2,"model":"gpt4o","raw":"x","code_path":"/tmp/a.v","lint_pass":true}"#;
        let rec: GenerationRecord = serde_json::from_str(line).expect("parse");
        assert_eq!(rec.cwe_target.as_deref(), Some("CWE-1234"));
        assert_eq!(rec.code_path.as_deref(), Some("/tmp/a.v"));
        assert_eq!(rec.raw.as_deref(), Some("x"));
    }

    #[test]
    fn test_record_deserializes_missing_fields() {
        let rec: GenerationRecord = serde_json::from_str("{}").expect("parse");
        assert_eq!(rec, GenerationRecord::default());
    }

    #[test]
    fn test_resolve_prefers_stored_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("a.v");
        std::fs::write(&path, "module stored; endmodule\n").expect("write");

        let rec = GenerationRecord {
            cwe_target: Some("CWE-1191".to_string()),
            code_path: Some(path.to_string_lossy().into_owned()),
            raw: Some("module raw; endmodule".to_string()),
        };
        let artifact = rec.resolve(dir.path());
        assert_eq!(artifact.text, "module stored; endmodule\n");
        assert_eq!(artifact.target, "CWE-1191");
    }

    #[test]
    fn test_resolve_relative_to_batch_dir() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("b.v"), "module rel; endmodule").expect("write");

        let rec = GenerationRecord {
            cwe_target: None,
            code_path: Some("some/other/place/b.v".to_string()),
            raw: None,
        };
        let artifact = rec.resolve(dir.path());
        assert_eq!(artifact.text, "module rel; endmodule");
        assert_eq!(artifact.target, "");
    }

    #[test]
    fn test_resolve_falls_back_to_raw_and_extracts_fence() {
        let dir = tempdir().expect("tempdir");
        let rec = GenerationRecord {
            cwe_target: Some("CWE-1231".to_string()),
            code_path: Some("/definitely/missing.v".to_string()),
            raw: Some("Here you go:\n```verilog\nmodule m; endmodule\n```\nDone.".to_string()),
        };
        let artifact = rec.resolve(dir.path());
        assert_eq!(artifact.text, "module m; endmodule");
    }

    #[test]
    fn test_resolve_with_nothing_is_empty() {
        let dir = tempdir().expect("tempdir");
        let artifact = GenerationRecord::default().resolve(dir.path());
        assert!(artifact.text.is_empty());
    }

    #[test]
    fn test_marker_detection() {
        let artifact = Artifact::new("// CWE: CWE-1234\nmodule m; endmodule", "CWE-1234");
        assert_eq!(artifact.marker().as_deref(), Some("// CWE: CWE-1234"));
        assert!(artifact.has_marker());

        let stripped = artifact.with_text("module m; endmodule");
        assert!(!stripped.has_marker());

        let untargeted = Artifact::new("// CWE: \nmodule m; endmodule", "  ");
        assert!(untargeted.marker().is_none());
        assert!(!untargeted.has_marker());
    }

    #[test]
    fn test_marker_must_match_whole_target() {
        assert!(contains_marker("// CWE: CWE-1234\nmodule m;", "CWE-1234"));
        assert!(contains_marker("  // CWE: CWE-1234 (timing)\n", "CWE-1234"));
        assert!(!contains_marker("// CWE: CWE-12345\nmodule m;", "CWE-1234"));
        assert!(!contains_marker("// CWE: CWE-1234a\n", "CWE-1234"));
    }
}
