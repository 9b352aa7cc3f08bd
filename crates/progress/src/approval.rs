//! Approval resolution - which modules and blocks a student has completed.
//!
//! Approval is never stored. It is derived from the student's approved grades
//! every time it is needed, and the result depends only on the set of grades,
//! not on their order.

use std::collections::{BTreeMap, BTreeSet};
use academia_core::{BlockId, ExamId, ExamOwner, ExamTier, Grade, GradeId, ModuleId, StudentId};
use serde::Serialize;
use tracing::{debug, warn};
use crate::config::ProgressionConfig;
use crate::error::{ProgressionError, Result};
use crate::structure::ProgramStructure;

/// More than one approved grade recorded for the same exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateApproval {
    /// Exam approved more than once
    pub exam_id: ExamId,
    /// The approved grades, sorted
    pub grade_ids: Vec<GradeId>,
}

/// What a student has approved within one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalState {
    /// Student the state belongs to
    pub student_id: StudentId,
    /// Modules with at least one approved PARCIAL/RECUP (equivalencies included)
    pub approved_module_ids: BTreeSet<ModuleId>,
    /// Approved tiers per module
    pub approved_exam_tiers_by_module: BTreeMap<ModuleId, BTreeSet<ExamTier>>,
    /// Blocks whose every module is approved
    pub approved_block_ids: BTreeSet<BlockId>,
    /// Exams with an approved grade
    pub approved_exam_ids: BTreeSet<ExamId>,
    /// Approved block-level tiers per block
    pub approved_final_tiers_by_block: BTreeMap<BlockId, BTreeSet<ExamTier>>,
    /// Data-quality warnings
    pub duplicate_approvals: Vec<DuplicateApproval>,
}

impl ApprovalState {
    /// State of a student with nothing approved.
    pub fn empty(student_id: StudentId) -> Self {
        Self {
            student_id,
            approved_module_ids: BTreeSet::new(),
            approved_exam_tiers_by_module: BTreeMap::new(),
            approved_block_ids: BTreeSet::new(),
            approved_exam_ids: BTreeSet::new(),
            approved_final_tiers_by_block: BTreeMap::new(),
            duplicate_approvals: Vec::new(),
        }
    }

    /// Whether a module is approved.
    pub fn is_module_approved(&self, id: ModuleId) -> bool {
        self.approved_module_ids.contains(&id)
    }

    /// Whether a block is approved.
    pub fn is_block_approved(&self, id: BlockId) -> bool {
        self.approved_block_ids.contains(&id)
    }

    /// Whether a module has an approved grade of the given tier.
    pub fn has_module_tier(&self, id: ModuleId, tier: ExamTier) -> bool {
        self.approved_exam_tiers_by_module
            .get(&id)
            .is_some_and(|tiers| tiers.contains(&tier))
    }

    /// Whether an exam already has an approved grade.
    pub fn has_approved_exam(&self, id: ExamId) -> bool {
        self.approved_exam_ids.contains(&id)
    }

    /// Duplicate warning for an exam, if any.
    pub fn duplicate_for(&self, id: ExamId) -> Option<&DuplicateApproval> {
        self.duplicate_approvals.iter().find(|d| d.exam_id == id)
    }

    /// Combine with another state of the same student (e.g. from a second
    /// cohort of the program) and re-derive block approval against
    /// `structure`.
    pub fn merge(mut self, other: &ApprovalState, structure: &ProgramStructure) -> Result<Self> {
        if other.student_id != self.student_id {
            return Err(ProgressionError::InvalidArgument(format!(
                "cannot merge approvals of student {} into student {}",
                other.student_id, self.student_id
            )));
        }

        self.approved_module_ids.extend(other.approved_module_ids.iter().copied());
        self.approved_exam_ids.extend(other.approved_exam_ids.iter().copied());
        for (module_id, tiers) in &other.approved_exam_tiers_by_module {
            self.approved_exam_tiers_by_module
                .entry(*module_id)
                .or_default()
                .extend(tiers.iter().copied());
        }
        for (block_id, tiers) in &other.approved_final_tiers_by_block {
            self.approved_final_tiers_by_block
                .entry(*block_id)
                .or_default()
                .extend(tiers.iter().copied());
        }

        let mut duplicates: BTreeMap<ExamId, BTreeSet<GradeId>> = BTreeMap::new();
        for dup in self.duplicate_approvals.iter().chain(&other.duplicate_approvals) {
            duplicates.entry(dup.exam_id).or_default().extend(dup.grade_ids.iter().copied());
        }
        self.duplicate_approvals = duplicates
            .into_iter()
            .map(|(exam_id, ids)| DuplicateApproval { exam_id, grade_ids: ids.into_iter().collect() })
            .collect();

        self.approved_block_ids = derive_blocks(structure, &self.approved_module_ids);
        Ok(self)
    }
}

/// Computes [`ApprovalState`] from a student's grades.
#[derive(Debug, Clone)]
pub struct ApprovalResolver {
    passing_score: f32,
}

impl Default for ApprovalResolver {
    fn default() -> Self {
        Self::new(&ProgressionConfig::default())
    }
}

impl ApprovalResolver {
    /// Create a resolver using the configured passing score.
    pub fn new(config: &ProgressionConfig) -> Self {
        Self { passing_score: config.passing_score }
    }

    /// Resolve a student's approvals.
    ///
    /// Every grade must belong to `student_id` and reference an exam of
    /// `structure`; failed grades are checked but otherwise ignored.
    pub fn resolve(
        &self,
        structure: &ProgramStructure,
        student_id: StudentId,
        grades: &[Grade],
    ) -> Result<ApprovalState> {
        let mut state = ApprovalState::empty(student_id);
        let mut approvals_by_exam: BTreeMap<ExamId, BTreeSet<GradeId>> = BTreeMap::new();

        for grade in grades {
            if grade.student_id != student_id {
                return Err(ProgressionError::InvalidArgument(format!(
                    "grade {} belongs to student {}, not {}",
                    grade.id, grade.student_id, student_id
                )));
            }

            let Some(exam) = structure.exam(grade.exam_id) else {
                return Err(ProgressionError::DataIntegrity(format!(
                    "grade {} references exam {} which does not exist in program {}",
                    grade.id,
                    grade.exam_id,
                    structure.program().code
                )));
            };

            if !grade.approved {
                continue;
            }
            if grade.score < self.passing_score {
                return Err(ProgressionError::DataIntegrity(format!(
                    "grade {} is marked approved with score {} below {}",
                    grade.id, grade.score, self.passing_score
                )));
            }

            approvals_by_exam.entry(exam.id).or_default().insert(grade.id);
            state.approved_exam_ids.insert(exam.id);

            match exam.owner {
                ExamOwner::Module(module_id) => {
                    state.approved_module_ids.insert(module_id);
                    state
                        .approved_exam_tiers_by_module
                        .entry(module_id)
                        .or_default()
                        .insert(exam.tier);
                }
                ExamOwner::Block(block_id) => {
                    state
                        .approved_final_tiers_by_block
                        .entry(block_id)
                        .or_default()
                        .insert(exam.tier);
                }
            }
        }

        for (exam_id, grade_ids) in approvals_by_exam {
            if grade_ids.len() > 1 {
                warn!(
                    "Student {} has {} approved grades for exam {}",
                    student_id,
                    grade_ids.len(),
                    exam_id
                );
                state.duplicate_approvals.push(DuplicateApproval {
                    exam_id,
                    grade_ids: grade_ids.into_iter().collect(),
                });
            }
        }

        state.approved_block_ids = derive_blocks(structure, &state.approved_module_ids);

        debug!(
            "Resolved student {} in {}: {} modules, {} blocks approved",
            student_id,
            structure.program().code,
            state.approved_module_ids.len(),
            state.approved_block_ids.len()
        );
        Ok(state)
    }
}

fn derive_blocks(structure: &ProgramStructure, modules: &BTreeSet<ModuleId>) -> BTreeSet<BlockId> {
    structure
        .blocks()
        .iter()
        .filter(|b| b.is_gradable() && b.module_ids().all(|m| modules.contains(&m)))
        .map(|b| b.block.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::DevJr;

    fn resolve(fx: &DevJr, grades: &[Grade]) -> Result<ApprovalState> {
        ApprovalResolver::default().resolve(&fx.structure(), fx.student.id, grades)
    }

    #[test]
    fn test_no_grades_approves_nothing() {
        let fx = DevJr::new();
        let state = resolve(&fx, &[]).unwrap();
        assert_eq!(state, ApprovalState::empty(fx.student.id));
    }

    #[test]
    fn test_passed_partial_approves_module_only() {
        let fx = DevJr::new();
        let state = resolve(&fx, &[fx.grade(fx.m1_parcial, 7.0)]).unwrap();

        assert!(state.is_module_approved(fx.m1));
        assert!(!state.is_module_approved(fx.m2));
        assert!(state.has_module_tier(fx.m1, ExamTier::Parcial));
        assert!(!state.is_block_approved(fx.fundamentos));
    }

    #[test]
    fn test_failed_grades_are_ignored() {
        let fx = DevJr::new();
        let state = resolve(&fx, &[fx.grade(fx.m1_parcial, 3.0)]).unwrap();
        assert!(state.approved_module_ids.is_empty());
    }

    #[test]
    fn test_block_approved_when_every_module_approved() {
        let fx = DevJr::new();
        let grades = [fx.grade(fx.m1_parcial, 7.0), fx.grade(fx.m2_recup, 6.0)];
        let state = resolve(&fx, &grades).unwrap();

        assert!(state.is_block_approved(fx.fundamentos));
        assert!(state.has_module_tier(fx.m2, ExamTier::Recup));
        assert!(!state.has_module_tier(fx.m2, ExamTier::Parcial));
    }

    #[test]
    fn test_block_finals_do_not_approve_modules() {
        let fx = DevJr::new();
        let state = resolve(&fx, &[fx.grade(fx.final_sinc, 9.0)]).unwrap();

        assert!(state.approved_module_ids.is_empty());
        assert!(!state.is_block_approved(fx.fundamentos));
        assert!(state.has_approved_exam(fx.final_sinc));
        assert!(state.approved_final_tiers_by_block[&fx.fundamentos].contains(&ExamTier::FinalSinc));
    }

    #[test]
    fn test_equivalency_approves_module_like_normal_grade() {
        let fx = DevJr::new();
        let equivalency = fx.grade(fx.m1_parcial, 8.0).as_equivalency(Some("UTN".into()), None);

        let via_equivalency = resolve(&fx, &[equivalency]).unwrap();
        let via_exam = resolve(&fx, &[fx.grade(fx.m1_parcial, 8.0)]).unwrap();

        assert!(via_equivalency.is_module_approved(fx.m1));
        assert_eq!(via_equivalency.approved_module_ids, via_exam.approved_module_ids);
        assert_eq!(
            via_equivalency.approved_exam_tiers_by_module,
            via_exam.approved_exam_tiers_by_module
        );
    }

    #[test]
    fn test_resolution_is_order_independent_and_idempotent() {
        let fx = DevJr::new();
        let grades = vec![
            fx.grade(fx.m1_parcial, 4.0),
            fx.grade(fx.m1_recup, 8.0),
            fx.grade(fx.m2_parcial, 6.5),
            fx.grade(fx.final_virtual, 7.0),
        ];
        let mut reversed = grades.clone();
        reversed.reverse();

        let first = resolve(&fx, &grades).unwrap();
        let again = resolve(&fx, &grades).unwrap();
        let backwards = resolve(&fx, &reversed).unwrap();

        assert_eq!(first, again);
        assert_eq!(first, backwards);
    }

    #[test]
    fn test_grade_on_unknown_exam_is_data_integrity() {
        let fx = DevJr::new();
        let dangling = fx.grade(ExamId::new(), 9.0);

        let err = resolve(&fx, &[dangling]).unwrap_err();
        assert!(matches!(err, ProgressionError::DataIntegrity(_)));
    }

    #[test]
    fn test_grade_of_other_student_is_invalid_argument() {
        let fx = DevJr::new();
        let mut grade = fx.grade(fx.m1_parcial, 9.0);
        grade.student_id = StudentId::new();

        let err = resolve(&fx, &[grade]).unwrap_err();
        assert!(matches!(err, ProgressionError::InvalidArgument(_)));
    }

    #[test]
    fn test_approved_flag_with_failing_score_is_data_integrity() {
        let fx = DevJr::new();
        let mut grade = fx.grade(fx.m1_parcial, 4.0);
        grade.approved = true;

        let err = resolve(&fx, &[grade]).unwrap_err();
        assert!(matches!(err, ProgressionError::DataIntegrity(_)));
    }

    #[test]
    fn test_duplicate_approvals_are_flagged_not_fatal() {
        let fx = DevJr::new();
        let a = fx.grade(fx.m1_parcial, 7.0);
        let b = fx.grade(fx.m1_parcial, 9.0);

        let state = resolve(&fx, &[a.clone(), b.clone()]).unwrap();
        assert!(state.is_module_approved(fx.m1));

        let dup = state.duplicate_for(fx.m1_parcial).unwrap();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(dup.grade_ids, expected);
    }

    #[test]
    fn test_merge_unions_and_rederives_blocks() {
        let fx = DevJr::new();
        let structure = fx.structure();
        let resolver = ApprovalResolver::default();
        let first = resolver.resolve(&structure, fx.student.id, &[fx.grade(fx.m1_parcial, 7.0)]).unwrap();
        let second = resolver.resolve(&structure, fx.student.id, &[fx.grade(fx.m2_parcial, 7.0)]).unwrap();

        assert!(!first.is_block_approved(fx.fundamentos));
        let merged = first.merge(&second, &structure).unwrap();
        assert!(merged.is_block_approved(fx.fundamentos));
    }

    #[test]
    fn test_merge_rejects_other_student() {
        let fx = DevJr::new();
        let structure = fx.structure();
        let mine = ApprovalState::empty(fx.student.id);
        let theirs = ApprovalState::empty(StudentId::new());

        assert!(matches!(
            mine.merge(&theirs, &structure),
            Err(ProgressionError::InvalidArgument(_))
        ));
    }
}
