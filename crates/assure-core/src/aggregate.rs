//! Per-group reduction of sample outcomes.
//!
//! A [`GroupSummary`] is always rebuilt from the complete set of a group's
//! outcomes; it is never updated in place.

use serde::{Deserialize, Serialize};

use crate::discovery::BatchKey;
use crate::domain::outcome::SampleOutcome;

/// Counts for one (model, shots) group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub model: String,
    pub shots: u32,
    pub input_count: usize,
    pub pass_at_1_count: usize,
    pub needed_repair_count: usize,
    pub repaired_success_count: usize,
    /// Attempts used by samples that needed repair; first-try passes add 0.
    pub attempts_sum: u64,
}

fn ratio(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

impl GroupSummary {
    /// Reduce a group's outcomes.
    pub fn from_outcomes<'a, I>(key: &BatchKey, outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a SampleOutcome>,
    {
        let mut summary = Self {
            model: key.model.clone(),
            shots: key.shots,
            input_count: 0,
            pass_at_1_count: 0,
            needed_repair_count: 0,
            repaired_success_count: 0,
            attempts_sum: 0,
        };

        for outcome in outcomes {
            summary.input_count += 1;
            match outcome {
                SampleOutcome::PassedFirstTry => summary.pass_at_1_count += 1,
                SampleOutcome::Repaired { attempts, .. } => {
                    summary.needed_repair_count += 1;
                    summary.repaired_success_count += 1;
                    summary.attempts_sum += u64::from(*attempts);
                }
                SampleOutcome::Failed { attempts, .. } => {
                    summary.needed_repair_count += 1;
                    summary.attempts_sum += u64::from(*attempts);
                }
            }
        }

        summary
    }

    pub fn is_empty(&self) -> bool {
        self.input_count == 0
    }

    pub fn failed_count(&self) -> usize {
        self.needed_repair_count - self.repaired_success_count
    }

    /// `pass_at_1_count / input_count`.
    pub fn pass_at_1(&self) -> f64 {
        ratio(self.pass_at_1_count as f64, self.input_count)
    }

    /// `repaired_success_count / needed_repair_count`, 0 when nothing needed repair.
    pub fn repair_success_rate(&self) -> f64 {
        ratio(self.repaired_success_count as f64, self.needed_repair_count)
    }

    /// `(pass_at_1_count + repaired_success_count) / input_count`.
    pub fn final_pass_rate(&self) -> f64 {
        ratio(
            (self.pass_at_1_count + self.repaired_success_count) as f64,
            self.input_count,
        )
    }

    /// `attempts_sum / needed_repair_count`, 0 when nothing needed repair.
    pub fn mean_attempts(&self) -> f64 {
        ratio(self.attempts_sum as f64, self.needed_repair_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> BatchKey {
        BatchKey {
            model: "gpt4o".to_string(),
            shots: 2,
        }
    }

    fn repaired(attempts: u32) -> SampleOutcome {
        SampleOutcome::Repaired {
            attempts,
            artifact: "module m; endmodule".to_string(),
        }
    }

    fn failed(attempts: u32) -> SampleOutcome {
        SampleOutcome::Failed {
            attempts,
            diagnostics: "err".to_string(),
        }
    }

    #[test]
    fn test_mixed_group() {
        let outcomes = vec![
            SampleOutcome::PassedFirstTry,
            SampleOutcome::PassedFirstTry,
            repaired(1),
            repaired(2),
            failed(3),
        ];
        let s = GroupSummary::from_outcomes(&key(), &outcomes);

        assert_eq!(s.input_count, 5);
        assert_eq!(s.pass_at_1_count, 2);
        assert_eq!(s.needed_repair_count, 3);
        assert_eq!(s.repaired_success_count, 2);
        assert_eq!(s.failed_count(), 1);
        assert_eq!(s.attempts_sum, 6);
        assert_eq!(
            s.pass_at_1_count + s.repaired_success_count + s.failed_count(),
            s.input_count
        );

        assert!((s.pass_at_1() - 0.4).abs() < 1e-9);
        assert!((s.repair_success_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert!((s.final_pass_rate() - 0.8).abs() < 1e-9);
        assert!((s.mean_attempts() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_repair_needed_rates_are_zero() {
        let outcomes = vec![SampleOutcome::PassedFirstTry; 4];
        let s = GroupSummary::from_outcomes(&key(), &outcomes);
        assert_eq!(s.needed_repair_count, 0);
        assert_eq!(s.repair_success_rate(), 0.0);
        assert_eq!(s.mean_attempts(), 0.0);
        assert_eq!(s.pass_at_1(), 1.0);
        assert_eq!(s.final_pass_rate(), 1.0);
    }

    #[test]
    fn test_all_failed() {
        let outcomes = vec![failed(3), failed(3)];
        let s = GroupSummary::from_outcomes(&key(), &outcomes);
        assert_eq!(s.pass_at_1(), 0.0);
        assert_eq!(s.repair_success_rate(), 0.0);
        assert_eq!(s.final_pass_rate(), 0.0);
        assert_eq!(s.mean_attempts(), 3.0);
    }

    #[test]
    fn test_empty_group_is_well_defined() {
        let s = GroupSummary::from_outcomes(&key(), &Vec::<SampleOutcome>::new());
        assert!(s.is_empty());
        assert_eq!(s.pass_at_1(), 0.0);
        assert_eq!(s.final_pass_rate(), 0.0);
        assert_eq!(s.mean_attempts(), 0.0);
    }
}
