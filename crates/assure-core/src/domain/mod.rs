//! Domain models for compile assurance.
//!
//! Canonical definitions for the core entities:
//! - `Artifact`: one generated candidate and the target it should exhibit
//! - `VerificationResult`: a single oracle verdict
//! - `RepairAttempt`: one repair/re-verify cycle
//! - `SampleOutcome`: terminal classification of one artifact

pub mod artifact;
pub mod digest;
pub mod error;
pub mod outcome;
pub mod verification;

pub use artifact::{Artifact, GenerationRecord};
pub use digest::ContentDigest;
pub use error::{AssureError, RepairCallError, Result};
pub use outcome::{RepairAttempt, SampleOutcome, SampleReport, SampleStatus};
pub use verification::VerificationResult;
