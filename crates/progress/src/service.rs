//! Progression service - the engine wired to storage.
//!
//! Every read loads the program tree and the student's grades afresh; nothing
//! is cached between calls, so a grade mutation is visible to the next query.

use std::collections::{BTreeSet, HashSet};
use academia_core::{
    BlockId, Cohort, CohortId, Enrollment, EnrollmentFilter, ExamId, ExamOwner, ExamTier, Grade,
    GradeFilter, GradeId, ModelError, ProgramId, StudentId,
};
use academia_storage::Storage;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::approval::{ApprovalResolver, ApprovalState};
use crate::config::ProgressionConfig;
use crate::eligibility::{
    BlockEnrollmentOptions, EligibilityFilter, EligibilityQuery, EligibilityReport,
};
use crate::error::{ProgressionError, Result};
use crate::evaluation::{BlockEvaluation, BlockEvaluationStatus};
use crate::graduation::{CohortGraduationSummary, GraduationEvaluator, GraduationStatus};
use crate::structure::{ProgramStructure, StructureLoader};

/// Data for recording or correcting a grade.
#[derive(Debug, Clone)]
pub struct GradeInput {
    /// Graded student
    pub student_id: StudentId,
    /// Exam sat
    pub exam_id: ExamId,
    /// Score obtained
    pub score: f32,
    /// Record as an equivalency
    pub is_equivalency: bool,
    /// Where the equivalency comes from
    pub equivalency_origin: Option<String>,
    /// Date of the original certificate
    pub equivalency_ref_date: Option<NaiveDate>,
}

impl GradeInput {
    /// A plain grade.
    pub fn new(student_id: StudentId, exam_id: ExamId, score: f32) -> Self {
        Self {
            student_id,
            exam_id,
            score,
            is_equivalency: false,
            equivalency_origin: None,
            equivalency_ref_date: None,
        }
    }

    /// Mark as an equivalency.
    pub fn equivalency(mut self, origin: Option<String>, ref_date: Option<NaiveDate>) -> Self {
        self.is_equivalency = true;
        self.equivalency_origin = origin;
        self.equivalency_ref_date = ref_date;
        self
    }
}

/// Outcome of a grade write.
#[derive(Debug, Clone, Serialize)]
pub struct GradeMutation {
    /// The grade written or removed
    pub grade: Grade,
    /// Program the grade's exam belongs to, if the exam still exists
    pub program_id: Option<ProgramId>,
    /// The student's approvals after the write
    pub approval: Option<ApprovalState>,
}

/// Graduation figures for one cohort.
#[derive(Debug, Clone, Serialize)]
pub struct CohortReport {
    /// Cohort evaluated
    pub cohort: Cohort,
    /// Aggregate figures
    pub summary: CohortGraduationSummary,
    /// Per-student standing
    pub students: Vec<GraduationStatus>,
}

/// Runs progression queries and grade mutations against a [`Storage`].
pub struct ProgressionService<S: Storage> {
    storage: S,
    config: ProgressionConfig,
}

impl<S: Storage> ProgressionService<S> {
    /// Create a service with the default configuration.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            config: ProgressionConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: ProgressionConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Active configuration.
    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    /// Underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Underlying storage, mutably.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Load a program tree.
    pub async fn load_structure(&self, program_id: ProgramId) -> Result<ProgramStructure> {
        StructureLoader::load(&self.storage, program_id).await
    }

    /// Resolve a student's approvals within a loaded program.
    pub async fn approval_state(
        &self,
        student_id: StudentId,
        structure: &ProgramStructure,
    ) -> Result<ApprovalState> {
        let grades = self.program_grades(student_id, structure).await?;
        ApprovalResolver::new(&self.config).resolve(structure, student_id, &grades)
    }

    /// Resolve a student's approvals within a program.
    pub async fn approvals(&self, student_id: StudentId, program_id: ProgramId) -> Result<ApprovalState> {
        self.require_student(student_id).await?;
        let structure = self.load_structure(program_id).await?;
        self.approval_state(student_id, &structure).await
    }

    /// Exams the student may sit for a block or module selection.
    pub async fn eligibility(
        &self,
        student_id: StudentId,
        program_id: ProgramId,
        query: &EligibilityQuery,
    ) -> Result<EligibilityReport> {
        self.require_student(student_id).await?;
        let structure = self.load_structure(program_id).await?;
        let approval = self.approval_state(student_id, &structure).await?;
        let enrollments = self.student_enrollments(student_id).await?;
        EligibilityFilter::new(&self.config).evaluate(&structure, &approval, &enrollments, query)
    }

    /// Modules of a program as offered on the enrollment screen.
    pub async fn enrollment_options(
        &self,
        student_id: StudentId,
        program_id: ProgramId,
    ) -> Result<Vec<BlockEnrollmentOptions>> {
        self.require_student(student_id).await?;
        let structure = self.load_structure(program_id).await?;
        let approval = self.approval_state(student_id, &structure).await?;
        let enrollments = self.student_enrollments(student_id).await?;
        EligibilityFilter::new(&self.config).enrollment_options(&structure, &approval, &enrollments)
    }

    /// Whether a student has graduated from a program.
    pub async fn graduation(&self, student_id: StudentId, program_id: ProgramId) -> Result<GraduationStatus> {
        self.require_student(student_id).await?;
        let structure = self.load_structure(program_id).await?;
        let approval = self.approval_state(student_id, &structure).await?;
        GraduationEvaluator::new().evaluate(&structure, &approval)
    }

    /// Graduation figures for every student enrolled in a cohort.
    pub async fn cohort_graduation(&self, cohort_id: CohortId) -> Result<CohortReport> {
        let cohort = self
            .storage
            .load_cohort(cohort_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("cohort", cohort_id))?;
        let structure = self.load_structure(cohort.program_id).await?;

        let filter = EnrollmentFilter {
            cohort_id: Some(cohort_id),
            ..Default::default()
        };
        let student_ids: BTreeSet<StudentId> = self
            .storage
            .list_enrollments(&filter)
            .await?
            .into_iter()
            .map(|e| e.student_id)
            .collect();

        let evaluator = GraduationEvaluator::new();
        let mut approvals = Vec::with_capacity(student_ids.len());
        let mut students = Vec::with_capacity(student_ids.len());
        for student_id in student_ids {
            let approval = self.approval_state(student_id, &structure).await?;
            students.push(evaluator.evaluate(&structure, &approval)?);
            approvals.push(approval);
        }
        let summary = evaluator.summarize(&structure, &approvals)?;

        info!(
            "Cohort {}: {}/{} graduates",
            cohort.name, summary.graduates, summary.total_students
        );
        Ok(CohortReport { cohort, summary, students })
    }

    /// Where a student stands in a block's finals sequence.
    pub async fn block_evaluation(&self, student_id: StudentId, block_id: BlockId) -> Result<BlockEvaluationStatus> {
        self.require_student(student_id).await?;
        let block = self
            .storage
            .load_block(block_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("block", block_id))?;
        let structure = self.load_structure(block.program_id).await?;
        let grades = self.program_grades(student_id, &structure).await?;
        let approval = ApprovalResolver::new(&self.config).resolve(&structure, student_id, &grades)?;
        BlockEvaluation::evaluate(&structure, block_id, &approval, &grades)
    }

    /// Record a new grade.
    pub async fn create_grade(&mut self, input: GradeInput) -> Result<GradeMutation> {
        self.require_student(input.student_id).await?;
        let program_id = self.program_of_exam(input.exam_id).await?;
        let structure = self.load_structure(program_id).await?;

        let mut grade = Grade::new(input.student_id, input.exam_id, input.score, self.config.passing_score);
        if input.is_equivalency {
            grade = grade.as_equivalency(input.equivalency_origin, input.equivalency_ref_date);
        }
        let approval = self.prepare_write(&grade, &structure).await?;

        self.storage.save_grade(&grade).await?;
        info!(
            "Recorded grade {} for student {} on exam {}: {}",
            grade.id, grade.student_id, grade.exam_id, grade.score
        );

        Ok(GradeMutation {
            grade,
            program_id: Some(program_id),
            approval: Some(approval),
        })
    }

    /// Correct an existing grade. The student cannot change.
    pub async fn update_grade(&mut self, id: GradeId, input: GradeInput) -> Result<GradeMutation> {
        let existing = self
            .storage
            .load_grade(id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("grade", id))?;
        if existing.student_id != input.student_id {
            warn!("Refused to move grade {} to another student", id);
            return Err(ProgressionError::InvalidArgument(format!(
                "grade {} belongs to student {}, not {}",
                id, existing.student_id, input.student_id
            )));
        }
        let program_id = self.program_of_exam(input.exam_id).await?;
        let structure = self.load_structure(program_id).await?;

        let mut grade = Grade::new(input.student_id, input.exam_id, input.score, self.config.passing_score);
        grade.id = existing.id;
        grade.graded_at = existing.graded_at;
        if input.is_equivalency {
            grade = grade.as_equivalency(input.equivalency_origin, input.equivalency_ref_date);
        }
        let approval = self.prepare_write(&grade, &structure).await?;

        self.storage.save_grade(&grade).await?;
        info!("Updated grade {}: {} -> {}", id, existing.score, grade.score);

        Ok(GradeMutation {
            grade,
            program_id: Some(program_id),
            approval: Some(approval),
        })
    }

    /// Remove a grade.
    ///
    /// A grade whose exam no longer exists is still removed; no approval state
    /// is returned for it.
    pub async fn delete_grade(&mut self, id: GradeId) -> Result<GradeMutation> {
        let grade = self
            .storage
            .load_grade(id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("grade", id))?;

        let program_id = match self.program_of_exam(grade.exam_id).await {
            Ok(program_id) => program_id,
            Err(ProgressionError::NotFound { .. } | ProgressionError::DataIntegrity(_)) => {
                self.storage.delete_grade(id).await?;
                warn!("Deleted grade {} referenced a missing exam {}", id, grade.exam_id);
                return Ok(GradeMutation { grade, program_id: None, approval: None });
            }
            Err(e) => return Err(e),
        };
        let structure = self.load_structure(program_id).await?;
        let mut remaining = self.program_grades(grade.student_id, &structure).await?;
        remaining.retain(|g| g.id != id);
        let approval = ApprovalResolver::new(&self.config).resolve(&structure, grade.student_id, &remaining)?;

        self.storage.delete_grade(id).await?;
        info!("Deleted grade {} of student {}", id, grade.student_id);

        Ok(GradeMutation {
            grade,
            program_id: Some(program_id),
            approval: Some(approval),
        })
    }

    async fn require_student(&self, student_id: StudentId) -> Result<()> {
        match self.storage.load_student(student_id).await? {
            Some(_) => Ok(()),
            None => Err(ProgressionError::not_found("student", student_id)),
        }
    }

    async fn student_enrollments(&self, student_id: StudentId) -> Result<Vec<Enrollment>> {
        let filter = EnrollmentFilter {
            student_id: Some(student_id),
            ..Default::default()
        };
        Ok(self.storage.list_enrollments(&filter).await?)
    }

    /// All of the student's grades on exams of `structure`.
    ///
    /// Grades on exams of other programs are skipped; a grade whose exam
    /// exists nowhere is a data integrity error.
    async fn program_grades(&self, student_id: StudentId, structure: &ProgramStructure) -> Result<Vec<Grade>> {
        let all = self.storage.list_grades(student_id, &GradeFilter::default()).await?;
        let mut foreign: HashSet<ExamId> = HashSet::new();
        let mut grades = Vec::with_capacity(all.len());

        for grade in all {
            if structure.exam(grade.exam_id).is_some() {
                grades.push(grade);
                continue;
            }
            if foreign.contains(&grade.exam_id) {
                continue;
            }
            if self.storage.load_exam(grade.exam_id).await?.is_none() {
                return Err(ProgressionError::DataIntegrity(format!(
                    "grade {} references missing exam {}",
                    grade.id, grade.exam_id
                )));
            }
            foreign.insert(grade.exam_id);
        }

        debug!(
            "Student {} has {} grades in program {}",
            student_id,
            grades.len(),
            structure.program().code
        );
        Ok(grades)
    }

    async fn program_of_exam(&self, exam_id: ExamId) -> Result<ProgramId> {
        let exam = self
            .storage
            .load_exam(exam_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("exam", exam_id))?;

        let block_id = match exam.owner {
            ExamOwner::Block(block_id) => block_id,
            ExamOwner::Module(module_id) => {
                self.storage
                    .load_module(module_id)
                    .await?
                    .ok_or_else(|| {
                        ProgressionError::DataIntegrity(format!(
                            "exam {} belongs to missing module {}",
                            exam_id, module_id
                        ))
                    })?
                    .block_id
            }
        };
        let block = self.storage.load_block(block_id).await?.ok_or_else(|| {
            ProgressionError::DataIntegrity(format!("exam {} belongs to missing block {}", exam_id, block_id))
        })?;
        Ok(block.program_id)
    }

    /// Validate `grade` and resolve the approvals the student would have
    /// once it is written. Nothing is persisted here, so a failure leaves
    /// storage untouched.
    async fn prepare_write(&self, grade: &Grade, structure: &ProgramStructure) -> Result<ApprovalState> {
        grade
            .validate(self.config.passing_score, self.config.max_score)
            .map_err(invalid_grade)?;

        let mut grades = self.program_grades(grade.student_id, structure).await?;
        grades.retain(|g| g.id != grade.id);
        let resolver = ApprovalResolver::new(&self.config);

        if self.config.reject_duplicate_approvals && grade.approved {
            let previous = grades
                .iter()
                .find(|g| g.approved && g.exam_id == grade.exam_id)
                .map(|g| g.id);
            if let Some(other) = previous {
                if !self.is_final_virtual_retake(&resolver, structure, grade, &grades)? {
                    warn!(
                        "Refused second approved grade for student {} on exam {}",
                        grade.student_id, grade.exam_id
                    );
                    return Err(ProgressionError::InvalidArgument(format!(
                        "exam {} already has approved grade {} for this student",
                        grade.exam_id, other
                    )));
                }
            }
        }

        grades.push(grade.clone());
        resolver.resolve(structure, grade.student_id, &grades)
    }

    /// A failed FINAL_SINC sends the student back to FINAL_VIRTUAL, so a new
    /// approved FINAL_VIRTUAL starts another cycle rather than duplicating
    /// the old one.
    fn is_final_virtual_retake(
        &self,
        resolver: &ApprovalResolver,
        structure: &ProgramStructure,
        grade: &Grade,
        others: &[Grade],
    ) -> Result<bool> {
        let Some(exam) = structure.exam(grade.exam_id) else {
            return Ok(false);
        };
        let (ExamTier::FinalVirtual, Some(block_id)) = (exam.tier, exam.owner.block_id()) else {
            return Ok(false);
        };
        let approval = resolver.resolve(structure, grade.student_id, others)?;
        let status = BlockEvaluation::evaluate(structure, block_id, &approval, others)?;
        Ok(status.can_sit_final_virtual)
    }
}

fn invalid_grade(err: ModelError) -> ProgressionError {
    ProgressionError::InvalidArgument(err.to_string())
}
