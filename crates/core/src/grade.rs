//! Grade model - one student's result on one exam.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::error::{ModelError, Result};
use crate::id::{ExamId, GradeId, ModuleId, StudentId};
use crate::Time;

/// Score needed to approve an exam.
pub const PASSING_SCORE: f32 = 6.0;

/// Top of the grading scale.
pub const MAX_SCORE: f32 = 10.0;

/// A student's result on an exam (a "nota").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    /// Unique identifier
    pub id: GradeId,

    /// Graded student
    pub student_id: StudentId,

    /// Graded exam
    pub exam_id: ExamId,

    /// Numeric score
    pub score: f32,

    /// Whether the score passes
    pub approved: bool,

    /// When the grade was recorded
    #[serde(default)]
    pub graded_at: Option<Time>,

    /// Recorded as an equivalency instead of a sat exam
    #[serde(default)]
    pub is_equivalency: bool,

    /// Institution or course the equivalency comes from
    #[serde(default)]
    pub equivalency_origin: Option<String>,

    /// Date of the original certificate
    #[serde(default)]
    pub equivalency_ref_date: Option<NaiveDate>,
}

impl Grade {
    /// Create a grade, deriving the approved flag from the passing score.
    pub fn new(student_id: StudentId, exam_id: ExamId, score: f32, passing_score: f32) -> Self {
        Self {
            id: GradeId::new(),
            student_id,
            exam_id,
            score,
            approved: score >= passing_score,
            graded_at: Some(chrono::Utc::now()),
            is_equivalency: false,
            equivalency_origin: None,
            equivalency_ref_date: None,
        }
    }

    /// Turn this grade into an equivalency.
    pub fn as_equivalency(mut self, origin: Option<String>, ref_date: Option<NaiveDate>) -> Self {
        self.is_equivalency = true;
        self.equivalency_origin = origin;
        self.equivalency_ref_date = ref_date;
        self
    }

    /// Check score range and flag consistency.
    pub fn validate(&self, passing_score: f32, max_score: f32) -> Result<()> {
        if !(0.0..=max_score).contains(&self.score) || self.score.is_nan() {
            return Err(ModelError::ScoreOutOfRange { score: self.score, max: max_score });
        }
        if self.approved && self.score < passing_score {
            return Err(ModelError::ApprovedBelowPassing {
                score: self.score,
                passing: passing_score,
            });
        }
        if !self.is_equivalency && self.equivalency_origin.is_some() {
            return Err(ModelError::StrayEquivalencyOrigin);
        }
        Ok(())
    }
}

/// Filter for querying a student's grades.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradeFilter {
    /// Only grades on exams of this module
    pub module_id: Option<ModuleId>,

    /// Only grades on this exam
    pub exam_id: Option<ExamId>,

    /// Only approved (or only failed) grades
    pub approved: Option<bool>,
}

impl GradeFilter {
    /// Only approved grades.
    pub fn approved() -> Self {
        Self { approved: Some(true), ..Default::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(score: f32) -> Grade {
        Grade::new(StudentId::new(), ExamId::new(), score, PASSING_SCORE)
    }

    #[test]
    fn test_approved_derived_from_score() {
        assert!(grade(6.0).approved);
        assert!(grade(9.5).approved);
        assert!(!grade(5.99).approved);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let err = grade(11.0).validate(PASSING_SCORE, MAX_SCORE).unwrap_err();
        assert!(matches!(err, ModelError::ScoreOutOfRange { .. }));
        assert!(grade(-1.0).validate(PASSING_SCORE, MAX_SCORE).is_err());
    }

    #[test]
    fn test_validate_rejects_approved_failing_score() {
        let mut g = grade(4.0);
        g.approved = true;
        let err = g.validate(PASSING_SCORE, MAX_SCORE).unwrap_err();
        assert!(matches!(err, ModelError::ApprovedBelowPassing { .. }));
    }

    #[test]
    fn test_equivalency_metadata() {
        let g = grade(8.0).as_equivalency(Some("UTN".to_string()), None);
        assert!(g.is_equivalency);
        assert!(g.validate(PASSING_SCORE, MAX_SCORE).is_ok());

        let mut stray = grade(8.0);
        stray.equivalency_origin = Some("UTN".to_string());
        assert_eq!(
            stray.validate(PASSING_SCORE, MAX_SCORE).unwrap_err(),
            ModelError::StrayEquivalencyOrigin
        );
    }
}
