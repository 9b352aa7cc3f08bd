//! Engine configuration.

use academia_core::{EnrollmentState, MAX_SCORE, PASSING_SCORE};
use serde::{Deserialize, Serialize};
use crate::error::{ProgressionError, Result};

/// Configuration for the progression engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// A grade is approved iff its score reaches this value
    pub passing_score: f32,
    /// Top of the grading scale
    pub max_score: f32,
    /// Enrollment states that make a module's exams reachable
    pub active_enrollment_states: Vec<EnrollmentState>,
    /// Refuse writes that would add a second approved grade for one exam
    pub reject_duplicate_approvals: bool,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            passing_score: PASSING_SCORE,
            max_score: MAX_SCORE,
            active_enrollment_states: vec![EnrollmentState::Activo],
            reject_duplicate_approvals: true,
        }
    }
}

impl ProgressionConfig {
    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_score.is_nan() || self.max_score <= 0.0 {
            return Err(ProgressionError::Configuration(format!(
                "max score must be positive, got {}",
                self.max_score
            )));
        }
        if self.passing_score.is_nan() || self.passing_score <= 0.0 || self.passing_score > self.max_score {
            return Err(ProgressionError::Configuration(format!(
                "passing score {} outside 0..={}",
                self.passing_score, self.max_score
            )));
        }
        if self.active_enrollment_states.is_empty() {
            return Err(ProgressionError::Configuration(
                "no enrollment state counts as active".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether an enrollment in `state` opens its module's exams.
    pub fn is_active(&self, state: EnrollmentState) -> bool {
        self.active_enrollment_states.contains(&state)
    }
}
