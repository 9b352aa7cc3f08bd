//! Block evaluation sequence.
//!
//! Once a block's modules are cleared the student sits FINAL_VIRTUAL, then
//! FINAL_SINC. A failed FINAL_SINC sends the student back to FINAL_VIRTUAL.
//! The definitive block grade is the latest approved FINAL_SINC or
//! EQUIVALENCIA.

use std::collections::HashMap;
use academia_core::{BlockId, ExamId, ExamTier, Grade, GradeId, ModuleId, Time};
use serde::Serialize;
use crate::approval::ApprovalState;
use crate::error::{ProgressionError, Result};
use crate::structure::ProgramStructure;

/// One recorded attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    /// Grade recorded for the attempt
    pub grade_id: GradeId,
    /// Exam sat
    pub exam_id: ExamId,
    /// Tier of the exam
    pub tier: ExamTier,
    /// Module, for module-level exams
    pub module_id: Option<ModuleId>,
    /// Score obtained
    pub score: f32,
    /// Whether it passed
    pub approved: bool,
    /// When it was graded
    pub graded_at: Option<Time>,
    /// 1-based attempt number on this exam
    pub attempt: u32,
}

/// What the student should do next in a block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum NextStep {
    /// Block has a definitive grade
    Completed {
        /// Definitive score
        score: f32,
    },
    /// Final virtual passed, synchronous final pending
    SitFinalSinc,
    /// Modules cleared, virtual final pending
    SitFinalVirtual,
    /// Modules still to approve
    ClearModules {
        /// Pending modules, in order
        modules: Vec<ModuleId>,
    },
    /// Block has no modules
    Ungradable,
}

/// Where a student stands in one block's evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct BlockEvaluationStatus {
    /// Block evaluated
    pub block_id: BlockId,
    /// Every module approved
    pub modules_cleared: bool,
    /// Modules not yet approved, in order
    pub pending_modules: Vec<ModuleId>,
    /// Latest approved FINAL_SINC or EQUIVALENCIA score
    pub definitive_grade: Option<f32>,
    /// FINAL_VIRTUAL may be sat
    pub can_sit_final_virtual: bool,
    /// FINAL_SINC may be sat
    pub can_sit_final_sinc: bool,
    /// Suggested next step
    pub next_step: NextStep,
    /// All attempts in the block, oldest first
    pub history: Vec<AttemptRecord>,
}

impl BlockEvaluationStatus {
    /// Attempt number the next grade on `exam_id` would get.
    pub fn next_attempt(&self, exam_id: ExamId) -> u32 {
        self.history.iter().filter(|a| a.exam_id == exam_id).count() as u32 + 1
    }
}

/// Evaluates the finals sequence of a block.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockEvaluation;

impl BlockEvaluation {
    /// Evaluate `block_id` from the student's approval state and grades.
    ///
    /// Grades on exams outside the block are ignored.
    pub fn evaluate(
        structure: &ProgramStructure,
        block_id: BlockId,
        approval: &ApprovalState,
        grades: &[Grade],
    ) -> Result<BlockEvaluationStatus> {
        let block = structure
            .block(block_id)
            .ok_or_else(|| ProgressionError::not_found("block", block_id))?;

        let mut in_block: Vec<&Grade> = Vec::new();
        for grade in grades {
            if grade.student_id != approval.student_id {
                return Err(ProgressionError::InvalidArgument(format!(
                    "grade {} belongs to student {}, not {}",
                    grade.id, grade.student_id, approval.student_id
                )));
            }
            if structure.block_of_exam(grade.exam_id).map(|b| b.block.id) == Some(block_id) {
                in_block.push(grade);
            }
        }
        in_block.sort_by(|a, b| a.graded_at.cmp(&b.graded_at).then(a.id.cmp(&b.id)));

        let mut attempts: HashMap<ExamId, u32> = HashMap::new();
        let mut history = Vec::with_capacity(in_block.len());
        for grade in in_block {
            let Some(exam) = structure.exam(grade.exam_id) else {
                continue;
            };
            let attempt = attempts.entry(exam.id).or_insert(0);
            *attempt += 1;
            history.push(AttemptRecord {
                grade_id: grade.id,
                exam_id: exam.id,
                tier: exam.tier,
                module_id: exam.owner.module_id(),
                score: grade.score,
                approved: grade.approved,
                graded_at: grade.graded_at,
                attempt: *attempt,
            });
        }

        let pending_modules: Vec<ModuleId> = block
            .module_ids()
            .filter(|m| !approval.is_module_approved(*m))
            .collect();
        let gradable = block.is_gradable();
        let modules_cleared = gradable && pending_modules.is_empty();

        let block_attempts = || history.iter().filter(|a| a.module_id.is_none());
        let definitive_grade = block_attempts()
            .filter(|a| a.approved)
            .filter(|a| matches!(a.tier, ExamTier::FinalSinc | ExamTier::Equivalencia))
            .last()
            .map(|a| a.score);

        let last_virtual = block_attempts()
            .enumerate()
            .filter(|(_, a)| a.tier == ExamTier::FinalVirtual)
            .last();
        let can_sit_final_sinc = definitive_grade.is_none()
            && match last_virtual {
                Some((pos, virtual_)) => {
                    virtual_.approved
                        && !block_attempts()
                            .skip(pos + 1)
                            .any(|a| a.tier == ExamTier::FinalSinc && !a.approved)
                }
                None => false,
            };
        let can_sit_final_virtual = definitive_grade.is_none()
            && !can_sit_final_sinc
            && gradable
            && (block.is_single_module() || modules_cleared);

        let next_step = if !gradable {
            NextStep::Ungradable
        } else if let Some(score) = definitive_grade {
            NextStep::Completed { score }
        } else if can_sit_final_sinc {
            NextStep::SitFinalSinc
        } else if can_sit_final_virtual {
            NextStep::SitFinalVirtual
        } else {
            NextStep::ClearModules { modules: pending_modules.clone() }
        };

        Ok(BlockEvaluationStatus {
            block_id,
            modules_cleared,
            pending_modules,
            definitive_grade,
            can_sit_final_virtual,
            can_sit_final_sinc,
            next_step,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalResolver;
    use crate::fixtures::DevJr;
    use chrono::{Duration, Utc};

    /// Grades with strictly increasing timestamps.
    fn timeline(fx: &DevJr, results: &[(ExamId, f32)]) -> Vec<Grade> {
        let start = Utc::now() - Duration::days(30);
        results
            .iter()
            .enumerate()
            .map(|(i, (exam, score))| {
                let mut grade = fx.grade(*exam, *score);
                grade.graded_at = Some(start + Duration::days(i as i64));
                grade
            })
            .collect()
    }

    fn status(fx: &DevJr, grades: &[Grade]) -> BlockEvaluationStatus {
        let structure = fx.structure();
        let approval = ApprovalResolver::default().resolve(&structure, fx.student.id, grades).unwrap();
        BlockEvaluation::evaluate(&structure, fx.fundamentos, &approval, grades).unwrap()
    }

    #[test]
    fn test_modules_pending() {
        let fx = DevJr::new();
        let grades = timeline(&fx, &[(fx.m1_parcial, 8.0)]);
        let status = status(&fx, &grades);

        assert!(!status.modules_cleared);
        assert!(!status.can_sit_final_virtual);
        assert_eq!(status.next_step, NextStep::ClearModules { modules: vec![fx.m2] });
    }

    #[test]
    fn test_full_sequence() {
        let fx = DevJr::new();
        let mut results = vec![(fx.m1_parcial, 8.0), (fx.m2_parcial, 4.0), (fx.m2_recup, 7.0)];

        let cleared = status(&fx, &timeline(&fx, &results));
        assert!(cleared.modules_cleared);
        assert_eq!(cleared.next_step, NextStep::SitFinalVirtual);

        results.push((fx.final_virtual, 7.0));
        let after_virtual = status(&fx, &timeline(&fx, &results));
        assert!(after_virtual.can_sit_final_sinc);
        assert_eq!(after_virtual.next_step, NextStep::SitFinalSinc);

        results.push((fx.final_sinc, 9.0));
        let done = status(&fx, &timeline(&fx, &results));
        assert_eq!(done.definitive_grade, Some(9.0));
        assert_eq!(done.next_step, NextStep::Completed { score: 9.0 });
        assert_eq!(done.history.len(), 5);
    }

    #[test]
    fn test_failed_sinc_requires_new_virtual() {
        let fx = DevJr::new();
        let grades = timeline(
            &fx,
            &[
                (fx.m1_parcial, 8.0),
                (fx.m2_parcial, 8.0),
                (fx.final_virtual, 7.0),
                (fx.final_sinc, 3.0),
            ],
        );
        let status = status(&fx, &grades);

        assert!(!status.can_sit_final_sinc);
        assert!(status.can_sit_final_virtual);
        assert_eq!(status.next_step, NextStep::SitFinalVirtual);
        assert_eq!(status.next_attempt(fx.final_virtual), 2);
        assert_eq!(status.next_attempt(fx.final_sinc), 2);
    }

    #[test]
    fn test_attempt_numbers_per_exam() {
        let fx = DevJr::new();
        let grades = timeline(&fx, &[(fx.m1_parcial, 3.0), (fx.m1_parcial, 5.0), (fx.m1_recup, 6.0)]);
        let status = status(&fx, &grades);

        let attempts: Vec<(ExamId, u32)> = status.history.iter().map(|a| (a.exam_id, a.attempt)).collect();
        assert_eq!(attempts, vec![(fx.m1_parcial, 1), (fx.m1_parcial, 2), (fx.m1_recup, 1)]);
        assert_eq!(status.history[0].module_id, Some(fx.m1));
    }

    #[test]
    fn test_equivalency_is_definitive() {
        let fx = DevJr::new();
        let grades = timeline(&fx, &[(fx.m1_parcial, 8.0), (fx.m2_parcial, 8.0), (fx.equivalencia, 8.5)]);
        let status = status(&fx, &grades);

        assert_eq!(status.definitive_grade, Some(8.5));
        assert!(!status.can_sit_final_virtual);
    }

    #[test]
    fn test_unknown_block() {
        let fx = DevJr::new();
        let structure = fx.structure();
        let err = BlockEvaluation::evaluate(&structure, BlockId::new(), &ApprovalState::empty(fx.student.id), &[])
            .unwrap_err();
        assert!(matches!(err, ProgressionError::NotFound { kind: "block", .. }));
    }
}
