//! Shared test programs.

use academia_core::{
    Block, BlockId, Cohort, CohortId, Enrollment, Exam, ExamId, ExamOwner, ExamTier, Grade,
    Module, ModuleId, Program, Student, StudentId, PASSING_SCORE,
};
use academia_storage::{MemoryStorage, Storage};
use crate::structure::ProgramStructure;

fn exam(owner: ExamOwner, tier: ExamTier) -> Exam {
    Exam::new(owner, tier).unwrap()
}

fn student() -> Student {
    Student {
        id: StudentId::new(),
        first_name: "Ana".to_string(),
        last_name: "Gómez".to_string(),
        dni: "30111222".to_string(),
        email: "ana@example.com".to_string(),
    }
}

/// "Dev Jr": one block "Fundamentos" with modules M1 and M2, each with
/// PARCIAL and RECUP, and the three block finals.
pub(crate) struct DevJr {
    pub program: Program,
    pub blocks: Vec<Block>,
    pub modules: Vec<Module>,
    pub exams: Vec<Exam>,
    pub fundamentos: BlockId,
    pub m1: ModuleId,
    pub m2: ModuleId,
    pub m1_parcial: ExamId,
    pub m1_recup: ExamId,
    pub m2_parcial: ExamId,
    pub m2_recup: ExamId,
    pub final_virtual: ExamId,
    pub final_sinc: ExamId,
    pub equivalencia: ExamId,
    pub student: Student,
    pub cohort: Cohort,
}

impl DevJr {
    pub fn new() -> Self {
        let program = Program::new("DEVJR", "Dev Jr");
        let block = Block::new(program.id, "Fundamentos", 1);
        let m1 = Module::new(block.id, "HTML y CSS", 1);
        let m2 = Module::new(block.id, "JavaScript", 2);

        let m1_parcial = exam(ExamOwner::Module(m1.id), ExamTier::Parcial);
        let m1_recup = exam(ExamOwner::Module(m1.id), ExamTier::Recup);
        let m2_parcial = exam(ExamOwner::Module(m2.id), ExamTier::Parcial);
        let m2_recup = exam(ExamOwner::Module(m2.id), ExamTier::Recup);
        let final_virtual = exam(ExamOwner::Block(block.id), ExamTier::FinalVirtual);
        let final_sinc = exam(ExamOwner::Block(block.id), ExamTier::FinalSinc);
        let equivalencia = exam(ExamOwner::Block(block.id), ExamTier::Equivalencia);

        let cohort = Cohort {
            id: CohortId::new(),
            program_id: program.id,
            name: "Dev Jr 2025-1".to_string(),
            start_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            calendar: vec![],
        };

        Self {
            fundamentos: block.id,
            m1: m1.id,
            m2: m2.id,
            m1_parcial: m1_parcial.id,
            m1_recup: m1_recup.id,
            m2_parcial: m2_parcial.id,
            m2_recup: m2_recup.id,
            final_virtual: final_virtual.id,
            final_sinc: final_sinc.id,
            equivalencia: equivalencia.id,
            exams: vec![
                m1_parcial, m1_recup, m2_parcial, m2_recup, final_virtual, final_sinc, equivalencia,
            ],
            blocks: vec![block],
            modules: vec![m1, m2],
            program,
            student: student(),
            cohort,
        }
    }

    pub fn structure(&self) -> ProgramStructure {
        ProgramStructure::build(
            self.program.clone(),
            self.blocks.clone(),
            self.modules.clone(),
            self.exams.clone(),
        )
        .unwrap()
    }

    pub fn grade(&self, exam_id: ExamId, score: f32) -> Grade {
        Grade::new(self.student.id, exam_id, score, PASSING_SCORE)
    }

    /// Active enrollments of the student into both modules.
    pub fn enrollments(&self) -> Vec<Enrollment> {
        vec![
            Enrollment::new(self.student.id, self.cohort.id, Some(self.m1)),
            Enrollment::new(self.student.id, self.cohort.id, Some(self.m2)),
        ]
    }

    pub async fn storage(&self) -> MemoryStorage {
        let mut storage = MemoryStorage::new();
        storage.save_program(&self.program).await.unwrap();
        for block in &self.blocks {
            storage.save_block(block).await.unwrap();
        }
        for module in &self.modules {
            storage.save_module(module).await.unwrap();
        }
        for exam in &self.exams {
            storage.save_exam(exam).await.unwrap();
        }
        storage.save_student(&self.student).await.unwrap();
        storage.save_cohort(&self.cohort).await.unwrap();
        for enrollment in self.enrollments() {
            storage.save_enrollment(&enrollment).await.unwrap();
        }
        storage
    }
}

/// "Intro": a single block whose only module has PARCIAL and RECUP, plus a
/// FINAL_VIRTUAL of its own.
pub(crate) struct Intro {
    pub program: Program,
    pub block: Block,
    pub module: Module,
    pub exams: Vec<Exam>,
    pub parcial: ExamId,
    pub recup: ExamId,
    pub final_virtual: ExamId,
    pub student: StudentId,
    pub cohort: CohortId,
}

impl Intro {
    pub fn new() -> Self {
        let program = Program::new("INTRO", "Intro");
        let block = Block::new(program.id, "Unico", 1);
        let module = Module::new(block.id, "Introducción", 1);
        let parcial = exam(ExamOwner::Module(module.id), ExamTier::Parcial);
        let recup = exam(ExamOwner::Module(module.id), ExamTier::Recup);
        let final_virtual = exam(ExamOwner::Block(block.id), ExamTier::FinalVirtual);

        Self {
            parcial: parcial.id,
            recup: recup.id,
            final_virtual: final_virtual.id,
            exams: vec![parcial, recup, final_virtual],
            program,
            block,
            module,
            student: StudentId::new(),
            cohort: CohortId::new(),
        }
    }

    pub fn structure(&self) -> ProgramStructure {
        ProgramStructure::build(
            self.program.clone(),
            vec![self.block.clone()],
            vec![self.module.clone()],
            self.exams.clone(),
        )
        .unwrap()
    }

    pub fn grade(&self, exam_id: ExamId, score: f32) -> Grade {
        Grade::new(self.student, exam_id, score, PASSING_SCORE)
    }

    pub fn enrollments(&self) -> Vec<Enrollment> {
        vec![Enrollment::new(self.student, self.cohort, Some(self.module.id))]
    }
}
