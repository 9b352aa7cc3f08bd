//! Graduation evaluation.

use academia_core::{BlockId, StudentId};
use serde::Serialize;
use tracing::debug;
use crate::approval::ApprovalState;
use crate::error::{ProgressionError, Result};
use crate::structure::ProgramStructure;

/// A student's graduation standing in one program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraduationStatus {
    /// Student evaluated
    pub student_id: StudentId,
    /// Every block of the program is approved
    pub graduated: bool,
    /// Blocks in the program
    pub blocks_required: usize,
    /// Blocks the student has approved
    pub blocks_approved: usize,
    /// `blocks_approved / blocks_required`
    pub rate: f64,
    /// Blocks still missing, in program order
    pub pending_blocks: Vec<BlockId>,
}

/// Graduation figures for a group of students.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortGraduationSummary {
    /// Students evaluated
    pub total_students: usize,
    /// Students who graduated
    pub graduates: usize,
    /// Blocks in the program
    pub blocks_required: usize,
    /// `graduates / total_students`, or 0 with no students
    pub rate: f64,
}

/// Decides whether students have completed a program.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraduationEvaluator;

impl GraduationEvaluator {
    /// Create an evaluator.
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one student.
    ///
    /// A program without blocks, or with a block that has no modules, cannot
    /// be graduated from and is reported as a configuration error.
    pub fn evaluate(
        &self,
        structure: &ProgramStructure,
        approval: &ApprovalState,
    ) -> Result<GraduationStatus> {
        check_graduable(structure)?;

        let blocks = structure.blocks();
        let pending_blocks: Vec<BlockId> = blocks
            .iter()
            .map(|b| b.block.id)
            .filter(|id| !approval.is_block_approved(*id))
            .collect();
        let blocks_required = blocks.len();
        let blocks_approved = blocks_required - pending_blocks.len();

        debug!(
            student = %approval.student_id,
            program = %structure.program().code,
            blocks_approved,
            blocks_required,
            "graduation evaluated"
        );

        Ok(GraduationStatus {
            student_id: approval.student_id,
            graduated: pending_blocks.is_empty(),
            blocks_required,
            blocks_approved,
            rate: blocks_approved as f64 / blocks_required as f64,
            pending_blocks,
        })
    }

    /// Evaluate every student independently and aggregate.
    pub fn summarize(
        &self,
        structure: &ProgramStructure,
        approvals: &[ApprovalState],
    ) -> Result<CohortGraduationSummary> {
        check_graduable(structure)?;

        let mut graduates = 0;
        for approval in approvals {
            if self.evaluate(structure, approval)?.graduated {
                graduates += 1;
            }
        }
        let total_students = approvals.len();
        let rate = if total_students == 0 {
            0.0
        } else {
            graduates as f64 / total_students as f64
        };

        Ok(CohortGraduationSummary {
            total_students,
            graduates,
            blocks_required: structure.blocks().len(),
            rate,
        })
    }
}

fn check_graduable(structure: &ProgramStructure) -> Result<()> {
    if structure.blocks().is_empty() {
        return Err(ProgressionError::Configuration(format!(
            "program '{}' has no blocks",
            structure.program().code
        )));
    }
    if let Some(block) = structure.ungraduable_blocks().first() {
        return Err(ProgressionError::Configuration(format!(
            "block '{}' of program '{}' has no modules",
            block.block.name,
            structure.program().code
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalResolver;
    use crate::fixtures::DevJr;
    use academia_core::{Block, Module, Program};

    #[test]
    fn test_graduates_after_all_modules() {
        let fx = DevJr::new();
        let structure = fx.structure();
        let approval = ApprovalResolver::default()
            .resolve(&structure, fx.student.id, &[fx.grade(fx.m1_parcial, 7.0), fx.grade(fx.m2_recup, 6.5)])
            .unwrap();

        let status = GraduationEvaluator::new().evaluate(&structure, &approval).unwrap();
        assert!(status.graduated);
        assert_eq!(status.blocks_required, 1);
        assert_eq!(status.blocks_approved, 1);
        assert_eq!(status.rate, 1.0);
        assert!(status.pending_blocks.is_empty());
    }

    #[test]
    fn test_partial_progress_is_not_graduation() {
        let program = Program::new("P", "Two blocks");
        let b1 = Block::new(program.id, "Uno", 1);
        let b2 = Block::new(program.id, "Dos", 2);
        let m1 = Module::new(b1.id, "A", 1);
        let m2 = Module::new(b2.id, "B", 1);
        let p1 = academia_core::Exam::new(
            academia_core::ExamOwner::Module(m1.id),
            academia_core::ExamTier::Parcial,
        )
        .unwrap();
        let structure = ProgramStructure::build(
            program,
            vec![b1.clone(), b2.clone()],
            vec![m1, m2],
            vec![p1.clone()],
        )
        .unwrap();
        let student = StudentId::new();
        let grade = academia_core::Grade::new(student, p1.id, 8.0, 6.0);
        let approval = ApprovalResolver::default().resolve(&structure, student, &[grade]).unwrap();

        let status = GraduationEvaluator::new().evaluate(&structure, &approval).unwrap();
        assert!(!status.graduated);
        assert_eq!(status.blocks_approved, 1);
        assert_eq!(status.rate, 0.5);
        assert_eq!(status.pending_blocks, vec![b2.id]);
    }

    #[test]
    fn test_block_final_alone_does_not_graduate() {
        let fx = DevJr::new();
        let structure = fx.structure();
        let approval = ApprovalResolver::default()
            .resolve(&structure, fx.student.id, &[fx.grade(fx.final_sinc, 9.0)])
            .unwrap();

        let status = GraduationEvaluator::new().evaluate(&structure, &approval).unwrap();
        assert!(!status.graduated);
    }

    #[test]
    fn test_program_without_blocks_is_configuration_error() {
        let structure =
            ProgramStructure::build(Program::new("EMPTY", "Empty"), vec![], vec![], vec![]).unwrap();
        let err = GraduationEvaluator::new()
            .evaluate(&structure, &ApprovalState::empty(StudentId::new()))
            .unwrap_err();
        assert!(matches!(err, ProgressionError::Configuration(_)));
    }

    #[test]
    fn test_block_without_modules_is_configuration_error() {
        let fx = DevJr::new();
        let mut blocks = fx.blocks.clone();
        blocks.push(Block::new(fx.program.id, "Vacio", 2));
        let structure =
            ProgramStructure::build(fx.program.clone(), blocks, fx.modules.clone(), fx.exams.clone())
                .unwrap();

        let err = GraduationEvaluator::new()
            .evaluate(&structure, &ApprovalState::empty(fx.student.id))
            .unwrap_err();
        match err {
            ProgressionError::Configuration(msg) => assert!(msg.contains("Vacio")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_summary_counts_each_student() {
        let fx = DevJr::new();
        let structure = fx.structure();
        let resolver = ApprovalResolver::default();
        let graduate = resolver
            .resolve(&structure, fx.student.id, &[fx.grade(fx.m1_parcial, 7.0), fx.grade(fx.m2_parcial, 7.0)])
            .unwrap();
        let other = StudentId::new();
        let pending = resolver.resolve(&structure, other, &[]).unwrap();

        let summary = GraduationEvaluator::new().summarize(&structure, &[graduate, pending]).unwrap();
        assert_eq!(summary.total_students, 2);
        assert_eq!(summary.graduates, 1);
        assert_eq!(summary.rate, 0.5);
    }

    #[test]
    fn test_summary_of_nobody_has_zero_rate() {
        let fx = DevJr::new();
        let summary = GraduationEvaluator::new().summarize(&fx.structure(), &[]).unwrap();
        assert_eq!(summary.total_students, 0);
        assert_eq!(summary.rate, 0.0);
    }
}
