//! Error taxonomy for compile assurance.

use std::path::PathBuf;

/// Failures of a single repair oracle call.
///
/// These never leave the repair adapter: the adapter logs them and
/// reports an empty repair instead.
#[derive(Debug, thiserror::Error)]
pub enum RepairCallError {
    #[error("repair oracle credential is not configured")]
    MissingCredential,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("repair oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed repair response: {0}")]
    MalformedResponse(String),
}

/// Run-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AssureError {
    #[error("malformed batch layout at {path}: {reason}")]
    MalformedBatchLayout { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssureError {
    pub fn malformed_batch(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedBatchLayout {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for compile assurance operations.
pub type Result<T> = std::result::Result<T, AssureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_batch_display() {
        let err = AssureError::malformed_batch("/results/gen_gpt4o_s2", "missing gen.jsonl");
        let msg = err.to_string();
        assert!(msg.contains("malformed batch layout"));
        assert!(msg.contains("gen_gpt4o_s2"));
        assert!(msg.contains("missing gen.jsonl"));
    }

    #[test]
    fn test_repair_call_error_display() {
        let err = RepairCallError::Status {
            status: 429,
            body: "rate limited".to_string(),
        };
        assert!(err.to_string().contains("429"));
        assert!(RepairCallError::MissingCredential
            .to_string()
            .contains("credential"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AssureError = io.into();
        assert!(err.to_string().contains("io error"));
    }
}
