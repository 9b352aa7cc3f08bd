//! In-memory storage backend.

use std::collections::HashMap;
use academia_core::{
    Block, BlockId, Cohort, CohortId, Enrollment, EnrollmentFilter, EnrollmentId, Exam,
    ExamFilter, ExamId, Grade, GradeFilter, GradeId, Module, ModuleId, Program, ProgramId,
    Student, StudentId,
};
use super::{Result, Storage};

/// Storage that keeps everything in process memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    programs: HashMap<ProgramId, Program>,
    blocks: HashMap<BlockId, Block>,
    modules: HashMap<ModuleId, Module>,
    exams: HashMap<ExamId, Exam>,
    grades: HashMap<GradeId, Grade>,
    enrollments: HashMap<EnrollmentId, Enrollment>,
    cohorts: HashMap<CohortId, Cohort>,
    students: HashMap<StudentId, Student>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored grades.
    pub fn grade_count(&self) -> usize {
        self.grades.len()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn save_program(&mut self, program: &Program) -> Result<()> {
        self.programs.insert(program.id, program.clone());
        Ok(())
    }

    async fn load_program(&self, id: ProgramId) -> Result<Option<Program>> {
        Ok(self.programs.get(&id).cloned())
    }

    async fn list_programs(&self) -> Result<Vec<Program>> {
        let mut programs: Vec<Program> = self.programs.values().cloned().collect();
        programs.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(programs)
    }

    async fn save_block(&mut self, block: &Block) -> Result<()> {
        self.blocks.insert(block.id, block.clone());
        Ok(())
    }

    async fn load_block(&self, id: BlockId) -> Result<Option<Block>> {
        Ok(self.blocks.get(&id).cloned())
    }

    async fn list_blocks(&self, program_id: ProgramId) -> Result<Vec<Block>> {
        Ok(self.blocks.values().filter(|b| b.program_id == program_id).cloned().collect())
    }

    async fn save_module(&mut self, module: &Module) -> Result<()> {
        self.modules.insert(module.id, module.clone());
        Ok(())
    }

    async fn load_module(&self, id: ModuleId) -> Result<Option<Module>> {
        Ok(self.modules.get(&id).cloned())
    }

    async fn list_modules(&self, block_id: BlockId) -> Result<Vec<Module>> {
        Ok(self.modules.values().filter(|m| m.block_id == block_id).cloned().collect())
    }

    async fn save_exam(&mut self, exam: &Exam) -> Result<()> {
        exam.validate()?;
        self.exams.insert(exam.id, exam.clone());
        Ok(())
    }

    async fn load_exam(&self, id: ExamId) -> Result<Option<Exam>> {
        Ok(self.exams.get(&id).cloned())
    }

    async fn list_exams(&self, filter: &ExamFilter) -> Result<Vec<Exam>> {
        Ok(self.exams.values().filter(|e| filter.matches(e)).cloned().collect())
    }

    async fn save_grade(&mut self, grade: &Grade) -> Result<()> {
        self.grades.insert(grade.id, grade.clone());
        Ok(())
    }

    async fn load_grade(&self, id: GradeId) -> Result<Option<Grade>> {
        Ok(self.grades.get(&id).cloned())
    }

    async fn list_grades(&self, student_id: StudentId, filter: &GradeFilter) -> Result<Vec<Grade>> {
        Ok(self
            .grades
            .values()
            .filter(|g| g.student_id == student_id)
            .filter(|g| filter.exam_id.map_or(true, |id| g.exam_id == id))
            .filter(|g| filter.approved.map_or(true, |approved| g.approved == approved))
            .filter(|g| {
                filter.module_id.map_or(true, |module_id| {
                    self.exams
                        .get(&g.exam_id)
                        .and_then(|e| e.owner.module_id())
                        == Some(module_id)
                })
            })
            .cloned()
            .collect())
    }

    async fn delete_grade(&mut self, id: GradeId) -> Result<Option<Grade>> {
        Ok(self.grades.remove(&id))
    }

    async fn save_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        self.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(())
    }

    async fn list_enrollments(&self, filter: &EnrollmentFilter) -> Result<Vec<Enrollment>> {
        Ok(self.enrollments.values().filter(|e| filter.matches(e)).cloned().collect())
    }

    async fn save_cohort(&mut self, cohort: &Cohort) -> Result<()> {
        self.cohorts.insert(cohort.id, cohort.clone());
        Ok(())
    }

    async fn load_cohort(&self, id: CohortId) -> Result<Option<Cohort>> {
        Ok(self.cohorts.get(&id).cloned())
    }

    async fn save_student(&mut self, student: &Student) -> Result<()> {
        self.students.insert(student.id, student.clone());
        Ok(())
    }

    async fn load_student(&self, id: StudentId) -> Result<Option<Student>> {
        Ok(self.students.get(&id).cloned())
    }
}
