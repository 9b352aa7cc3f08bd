//! Storage trait abstraction.

use async_trait::async_trait;
use academia_core::{
    Block, BlockId, Cohort, CohortId, Enrollment, EnrollmentFilter, Exam, ExamFilter, ExamId,
    Grade, GradeFilter, GradeId, ModelError, Module, ModuleId, Program, ProgramId, Student,
    StudentId,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored record violates a model invariant
    #[error("invalid record: {0}")]
    Model(#[from] ModelError),
}

/// Storage abstraction for Academia data.
///
/// This is the data-access layer the progression engine reads through. Reads
/// return snapshots; nothing returned is live.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Structure operations ===

    /// Save a program (create or update).
    async fn save_program(&mut self, program: &Program) -> Result<()>;

    /// Load a program by ID.
    async fn load_program(&self, id: ProgramId) -> Result<Option<Program>>;

    /// List all programs.
    async fn list_programs(&self) -> Result<Vec<Program>>;

    /// Save a block.
    async fn save_block(&mut self, block: &Block) -> Result<()>;

    /// Load a block by ID.
    async fn load_block(&self, id: BlockId) -> Result<Option<Block>>;

    /// List the blocks of a program.
    async fn list_blocks(&self, program_id: ProgramId) -> Result<Vec<Block>>;

    /// Save a module.
    async fn save_module(&mut self, module: &Module) -> Result<()>;

    /// Load a module by ID.
    async fn load_module(&self, id: ModuleId) -> Result<Option<Module>>;

    /// List the modules of a block.
    async fn list_modules(&self, block_id: BlockId) -> Result<Vec<Module>>;

    /// Save an exam.
    async fn save_exam(&mut self, exam: &Exam) -> Result<()>;

    /// Load an exam by ID.
    async fn load_exam(&self, id: ExamId) -> Result<Option<Exam>>;

    /// List exams matching the filter.
    async fn list_exams(&self, filter: &ExamFilter) -> Result<Vec<Exam>>;

    // === Grade operations ===

    /// Save a grade (create or update).
    async fn save_grade(&mut self, grade: &Grade) -> Result<()>;

    /// Load a grade by ID.
    async fn load_grade(&self, id: GradeId) -> Result<Option<Grade>>;

    /// List a student's grades matching the filter.
    async fn list_grades(&self, student_id: StudentId, filter: &GradeFilter) -> Result<Vec<Grade>>;

    /// Delete a grade, returning it if it existed.
    async fn delete_grade(&mut self, id: GradeId) -> Result<Option<Grade>>;

    // === Enrollment operations ===

    /// Save an enrollment.
    async fn save_enrollment(&mut self, enrollment: &Enrollment) -> Result<()>;

    /// List enrollments matching the filter.
    async fn list_enrollments(&self, filter: &EnrollmentFilter) -> Result<Vec<Enrollment>>;

    /// Save a cohort.
    async fn save_cohort(&mut self, cohort: &Cohort) -> Result<()>;

    /// Load a cohort by ID.
    async fn load_cohort(&self, id: CohortId) -> Result<Option<Cohort>>;

    /// Save a student.
    async fn save_student(&mut self, student: &Student) -> Result<()>;

    /// Load a student by ID.
    async fn load_student(&self, id: StudentId) -> Result<Option<Student>>;
}
