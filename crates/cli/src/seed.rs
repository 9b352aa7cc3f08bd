//! Demo data for trying the CLI out.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use academia_core::{
    Block, CalendarWeek, Cohort, CohortId, Enrollment, Exam, ExamOwner, ExamTier, Module,
    Program, Student, StudentId, WeekKind,
};
use academia_storage::Storage;

/// Identifiers of the seeded records.
pub struct Seeded {
    pub programs: Vec<Program>,
    pub student: Student,
    pub cohort: CohortId,
}

fn date(y: i32, m: u32, d: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| anyhow!("invalid date {}-{}-{}", y, m, d))
}

/// Module-level exams: a PARCIAL on `parcial` and a RECUP two weeks later.
fn module_exams(module: &Module, parcial: NaiveDate) -> Result<Vec<Exam>> {
    let owner = ExamOwner::Module(module.id);
    Ok(vec![
        Exam::new(owner, ExamTier::Parcial)?.on(parcial),
        Exam::new(owner, ExamTier::Recup)?.on(parcial + chrono::Duration::days(14)),
    ])
}

fn block_finals(block: &Block, virtual_: NaiveDate) -> Result<Vec<Exam>> {
    let owner = ExamOwner::Block(block.id);
    Ok(vec![
        Exam::new(owner, ExamTier::FinalVirtual)?.on(virtual_),
        Exam::new(owner, ExamTier::FinalSinc)?.on(virtual_ + chrono::Duration::days(7)),
        Exam::new(owner, ExamTier::Equivalencia)?,
    ])
}

/// Write "Dev Jr" (two blocks of two modules) and "Intro" (one block with a
/// single module), plus a student enrolled in every Dev Jr module.
pub async fn seed<S: Storage + ?Sized>(storage: &mut S) -> Result<Seeded> {
    let devjr = Program::new("DEVJR", "Desarrollador Junior");
    let fundamentos = Block::new(devjr.id, "Fundamentos", 1);
    let backend = Block::new(devjr.id, "Backend", 2);
    let modules = vec![
        Module::new(fundamentos.id, "HTML y CSS", 1).with_dates(date(2025, 3, 3)?, date(2025, 4, 11)?)?,
        Module::new(fundamentos.id, "JavaScript", 2).with_dates(date(2025, 4, 14)?, date(2025, 5, 23)?)?,
        Module::new(backend.id, "Node.js", 1).with_dates(date(2025, 6, 2)?, date(2025, 7, 11)?)?,
        Module::new(backend.id, "Bases de datos", 2).practical(75),
    ];

    let mut exams = Vec::new();
    for (module, parcial) in modules.iter().zip([
        date(2025, 4, 7)?,
        date(2025, 5, 19)?,
        date(2025, 7, 7)?,
        date(2025, 8, 18)?,
    ]) {
        exams.extend(module_exams(module, parcial)?);
    }
    exams.extend(block_finals(&fundamentos, date(2025, 6, 9)?)?);
    exams.extend(block_finals(&backend, date(2025, 9, 15)?)?);

    let intro = Program::new("INTRO", "Introducción a la programación");
    let unico = Block::new(intro.id, "Unico", 1);
    let intro_module = Module::new(unico.id, "Lógica y algoritmos", 1);
    exams.extend(module_exams(&intro_module, date(2025, 4, 28)?)?);

    let calendar = (1..=24)
        .map(|order| CalendarWeek {
            order,
            kind: match order {
                6 | 12 | 18 | 24 => WeekKind::Parcial,
                14 => WeekKind::FinalVirtual,
                15 => WeekKind::FinalSinc,
                _ => WeekKind::Clase,
            },
        })
        .collect();
    let cohort = Cohort {
        id: CohortId::new(),
        program_id: devjr.id,
        name: "Dev Jr 2025-1".to_string(),
        start_date: date(2025, 3, 3)?,
        calendar,
    };
    let student = Student {
        id: StudentId::new(),
        first_name: "Ana".to_string(),
        last_name: "Gómez".to_string(),
        dni: "30111222".to_string(),
        email: "ana.gomez@example.com".to_string(),
    };

    for program in [&devjr, &intro] {
        storage.save_program(program).await?;
    }
    for block in [&fundamentos, &backend, &unico] {
        storage.save_block(block).await?;
    }
    for module in modules.iter().chain(std::iter::once(&intro_module)) {
        storage.save_module(module).await?;
    }
    for exam in &exams {
        storage.save_exam(exam).await?;
    }
    storage.save_cohort(&cohort).await?;
    storage.save_student(&student).await?;
    for module in &modules {
        storage
            .save_enrollment(&Enrollment::new(student.id, cohort.id, Some(module.id)))
            .await?;
    }

    Ok(Seeded {
        programs: vec![devjr, intro],
        student,
        cohort: cohort.id,
    })
}
