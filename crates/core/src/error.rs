//! Model validation errors.

use crate::ExamTier;

/// Result type for model construction and validation.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Violations of invariants that hold for every stored record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Module exams are PARCIAL/RECUP, block exams are FINAL_*/EQUIVALENCIA
    #[error("exam tier {tier} cannot be owned by a {owner}")]
    TierOwnerMismatch {
        /// Offending tier
        tier: ExamTier,
        /// "module" or "block"
        owner: &'static str,
    },

    /// Score outside the grading scale
    #[error("score {score} is outside 0..={max}")]
    ScoreOutOfRange {
        /// Recorded score
        score: f32,
        /// Top of the scale
        max: f32,
    },

    /// Approved flag set on a failing score
    #[error("grade marked approved with score {score} below passing score {passing}")]
    ApprovedBelowPassing {
        /// Recorded score
        score: f32,
        /// Passing threshold
        passing: f32,
    },

    /// Equivalency origin given on a grade that is not an equivalency
    #[error("equivalency origin set on a non-equivalency grade")]
    StrayEquivalencyOrigin,

    /// Module end date precedes its start date
    #[error("module ends ({end}) before it starts ({start})")]
    InvertedDates {
        /// Start date
        start: chrono::NaiveDate,
        /// End date
        end: chrono::NaiveDate,
    },
}
