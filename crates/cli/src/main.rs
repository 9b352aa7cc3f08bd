//! Academia CLI - academic progression queries and grade management.

mod seed;

use std::path::PathBuf;
use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use academia_core::{BlockId, CohortId, ExamId, GradeId, ModuleId, ProgramId, StudentId};
use academia_progress::{
    ApprovalState, EligibilityQuery, GradeInput, GradeMutation, ModuleStatus, NextStep,
    ProgramStructure, ProgressionConfig, ProgressionService,
};
use academia_storage::{JsonStorage, Storage};

#[derive(Parser)]
#[command(name = "academia")]
#[command(about = "Academic progression engine", long_about = None)]
struct Cli {
    /// Data directory
    #[arg(long, global = true, env = "ACADEMIA_DATA_DIR", default_value = ".academia")]
    data_dir: PathBuf,

    /// Minimum score that approves an exam
    #[arg(long, global = true)]
    passing_score: Option<f32>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write demo programs, a cohort and a student
    Seed,
    /// List programs
    Programs,
    /// Show a program's blocks, modules and exams
    Structure {
        /// Program id or code
        program: String,
    },
    /// Show what a student has approved in a program
    Approvals {
        /// Student ID
        student: String,
        /// Program id or code
        program: String,
    },
    /// List the exams a student may sit
    Eligibility {
        /// Student ID
        student: String,
        /// Program id or code
        program: String,
        /// Block id or name
        #[arg(long)]
        block: String,
        /// Module id or name; omit to ask for the block's finals
        #[arg(long)]
        module: Option<String>,
    },
    /// Show modules open for enrollment
    Enrollment {
        /// Student ID
        student: String,
        /// Program id or code
        program: String,
    },
    /// Check whether a student graduated
    Graduation {
        /// Student ID
        student: String,
        /// Program id or code
        program: String,
    },
    /// Graduation figures for a cohort
    CohortReport {
        /// Cohort ID
        cohort: String,
    },
    /// Show a student's progress through a block's finals
    BlockStatus {
        /// Student ID
        student: String,
        /// Block ID
        block: String,
    },
    /// Record, correct or remove grades
    #[command(subcommand)]
    Grade(GradeCommands),
}

#[derive(Subcommand)]
enum GradeCommands {
    /// Record a grade
    Add {
        /// Student ID
        #[arg(long)]
        student: String,
        /// Exam ID
        #[arg(long)]
        exam: String,
        /// Score
        #[arg(long)]
        score: f32,
        /// Record as an equivalency
        #[arg(long)]
        equivalency: bool,
        /// Origin of the equivalency
        #[arg(long, requires = "equivalency")]
        origin: Option<String>,
    },
    /// Correct a grade's score
    Update {
        /// Grade ID
        id: String,
        /// New score
        #[arg(long)]
        score: f32,
    },
    /// Remove a grade
    Delete {
        /// Grade ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let storage = JsonStorage::new(&cli.data_dir).await?;
    debug!("Using data directory {}", storage.root().display());

    let mut config = ProgressionConfig::default();
    if let Some(score) = cli.passing_score {
        config.passing_score = score;
    }
    let mut service = ProgressionService::new(storage).with_config(config)?;
    let json = cli.json;

    match cli.command {
        Commands::Seed => {
            let seeded = seed::seed(service.storage_mut()).await?;
            info!("Seeded demo data into {}", cli.data_dir.display());
            for program in &seeded.programs {
                println!("Program {} | {} - {}", program.id, program.code, program.name);
            }
            println!("Cohort  {}", seeded.cohort);
            println!("Student {} | {}", seeded.student.id, seeded.student.display_name());
        }
        Commands::Programs => {
            let programs = service.storage().list_programs().await?;
            if json {
                return print_json(&programs);
            }
            println!("Programs ({})", programs.len());
            for program in programs {
                println!("  {} | {} - {}", program.id, program.code, program.name);
            }
        }
        Commands::Structure { program } => {
            let program_id = resolve_program(service.storage(), &program).await?;
            let structure = service.load_structure(program_id).await?;
            if json {
                return print_json(&structure.blocks());
            }
            print_structure(&structure);
        }
        Commands::Approvals { student, program } => {
            let student_id: StudentId = parse_id(&student, "student")?;
            let program_id = resolve_program(service.storage(), &program).await?;
            let structure = service.load_structure(program_id).await?;
            let approval = service.approvals(student_id, program_id).await?;
            if json {
                return print_json(&approval);
            }
            print_approvals(&structure, &approval);
        }
        Commands::Eligibility { student, program, block, module } => {
            let student_id: StudentId = parse_id(&student, "student")?;
            let program_id = resolve_program(service.storage(), &program).await?;
            let structure = service.load_structure(program_id).await?;
            let block_id = resolve_block(&structure, &block)?;
            let query = match module {
                Some(m) => EligibilityQuery::module(block_id, resolve_module(&structure, block_id, &m)?),
                None => EligibilityQuery::finals(block_id),
            };

            let report = service.eligibility(student_id, program_id, &query).await?;
            if json {
                return print_json(&report);
            }

            println!("Modules");
            for option in &report.modules {
                println!(
                    "  {} | {}. {} | {}{}",
                    option.module_id,
                    option.order,
                    option.name,
                    format_module_status(option.status),
                    if option.selectable { "" } else { " (locked)" }
                );
            }
            if !report.module_selection_open {
                println!("  All modules approved; only finals remain");
            }
            if report.finals_promoted {
                println!("Single-module block: module exams count as finals");
            }
            println!("Offerable exams ({})", report.exams.len());
            for offer in &report.exams {
                println!(
                    "  {} | {} | {}{}",
                    offer.exam.id,
                    offer.exam.tier,
                    offer.exam.date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
                    if offer.already_approved_exists { " | already approved" } else { "" }
                );
            }
            for warning in &report.warnings {
                println!("Warning: exam {} approved {} times", warning.exam_id, warning.grade_ids.len());
            }
        }
        Commands::Enrollment { student, program } => {
            let student_id: StudentId = parse_id(&student, "student")?;
            let program_id = resolve_program(service.storage(), &program).await?;
            let options = service.enrollment_options(student_id, program_id).await?;
            if json {
                return print_json(&options);
            }
            for block in options {
                println!("{}", block.name);
                for module in block.modules {
                    println!(
                        "  {} | {} | {}{}",
                        module.module_id,
                        module.name,
                        format_module_status(module.status),
                        if module.can_enroll { "" } else { " (unavailable)" }
                    );
                }
            }
        }
        Commands::Graduation { student, program } => {
            let student_id: StudentId = parse_id(&student, "student")?;
            let program_id = resolve_program(service.storage(), &program).await?;
            let status = service.graduation(student_id, program_id).await?;
            if json {
                return print_json(&status);
            }
            println!("Graduated: {}", if status.graduated { "yes" } else { "no" });
            println!(
                "Blocks: {}/{} ({:.0}%)",
                status.blocks_approved,
                status.blocks_required,
                status.rate * 100.0
            );
            for block in &status.pending_blocks {
                println!("  Pending block {}", block);
            }
        }
        Commands::CohortReport { cohort } => {
            let cohort_id: CohortId = parse_id(&cohort, "cohort")?;
            let report = service.cohort_graduation(cohort_id).await?;
            if json {
                return print_json(&report);
            }
            println!("Cohort {}", report.cohort.name);
            println!(
                "  Graduates: {}/{} ({:.1}%)",
                report.summary.graduates,
                report.summary.total_students,
                report.summary.rate * 100.0
            );
            for status in &report.students {
                println!(
                    "  {} | {}/{} blocks{}",
                    status.student_id,
                    status.blocks_approved,
                    status.blocks_required,
                    if status.graduated { " | graduated" } else { "" }
                );
            }
        }
        Commands::BlockStatus { student, block } => {
            let student_id: StudentId = parse_id(&student, "student")?;
            let block_id: BlockId = parse_id(&block, "block")?;
            let status = service.block_evaluation(student_id, block_id).await?;
            if json {
                return print_json(&status);
            }
            println!("Modules cleared: {}", if status.modules_cleared { "yes" } else { "no" });
            if let Some(score) = status.definitive_grade {
                println!("Definitive grade: {}", score);
            }
            println!("Next step: {}", format_next_step(&status.next_step));
            println!("History ({})", status.history.len());
            for attempt in &status.history {
                println!(
                    "  {} | {} #{} | {} | {}",
                    attempt.graded_at.map(|t| t.format("%Y-%m-%d").to_string()).unwrap_or_else(|| "-".to_string()),
                    attempt.tier,
                    attempt.attempt,
                    attempt.score,
                    if attempt.approved { "approved" } else { "failed" }
                );
            }
        }
        Commands::Grade(command) => {
            let mutation = match command {
                GradeCommands::Add { student, exam, score, equivalency, origin } => {
                    let student_id: StudentId = parse_id(&student, "student")?;
                    let exam_id: ExamId = parse_id(&exam, "exam")?;
                    let mut input = GradeInput::new(student_id, exam_id, score);
                    if equivalency {
                        input = input.equivalency(origin, None);
                    }
                    service.create_grade(input).await?
                }
                GradeCommands::Update { id, score } => {
                    let grade_id: GradeId = parse_id(&id, "grade")?;
                    let Some(existing) = service.storage().load_grade(grade_id).await? else {
                        bail!("grade not found: {}", grade_id);
                    };
                    let mut input = GradeInput::new(existing.student_id, existing.exam_id, score);
                    if existing.is_equivalency {
                        input = input.equivalency(existing.equivalency_origin, existing.equivalency_ref_date);
                    }
                    service.update_grade(grade_id, input).await?
                }
                GradeCommands::Delete { id } => {
                    let grade_id: GradeId = parse_id(&id, "grade")?;
                    service.delete_grade(grade_id).await?
                }
            };
            if json {
                return print_json(&mutation);
            }
            print_mutation(&mutation);
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_id<T: std::str::FromStr>(raw: &str, kind: &str) -> Result<T> {
    raw.parse().map_err(|_| anyhow!("Invalid {} ID: {}", kind, raw))
}

/// Accept a program ULID or its code.
async fn resolve_program<S: Storage>(storage: &S, raw: &str) -> Result<ProgramId> {
    if let Ok(id) = raw.parse() {
        return Ok(id);
    }
    storage
        .list_programs()
        .await?
        .into_iter()
        .find(|p| p.code.eq_ignore_ascii_case(raw))
        .map(|p| p.id)
        .ok_or_else(|| anyhow!("Unknown program: {}", raw))
}

fn resolve_block(structure: &ProgramStructure, raw: &str) -> Result<BlockId> {
    if let Ok(id) = raw.parse() {
        return Ok(id);
    }
    structure
        .blocks()
        .iter()
        .find(|b| b.block.name.eq_ignore_ascii_case(raw))
        .map(|b| b.block.id)
        .ok_or_else(|| anyhow!("Unknown block: {}", raw))
}

fn resolve_module(structure: &ProgramStructure, block_id: BlockId, raw: &str) -> Result<ModuleId> {
    if let Ok(id) = raw.parse() {
        return Ok(id);
    }
    structure
        .block(block_id)
        .and_then(|b| b.modules.iter().find(|m| m.module.name.eq_ignore_ascii_case(raw)))
        .map(|m| m.module.id)
        .ok_or_else(|| anyhow!("Unknown module: {}", raw))
}

fn print_structure(structure: &ProgramStructure) {
    let program = structure.program();
    println!("{} - {} ({})", program.code, program.name, program.id);
    for block in structure.blocks() {
        println!("  Block {}. {} ({})", block.block.order, block.block.name, block.block.id);
        for node in &block.modules {
            println!("    Module {}. {} ({})", node.module.order, node.module.name, node.module.id);
            for exam in &node.exams {
                println!("      {} {}", exam.tier, exam.id);
            }
        }
        for exam in &block.exams {
            println!("    {} {}", exam.tier, exam.id);
        }
        if !block.is_gradable() {
            println!("    (no modules; block cannot be approved)");
        }
    }
}

fn print_approvals(structure: &ProgramStructure, approval: &ApprovalState) {
    for block in structure.blocks() {
        let mark = if approval.is_block_approved(block.block.id) { "x" } else { " " };
        println!("[{}] {}", mark, block.block.name);
        for node in &block.modules {
            let mark = if approval.is_module_approved(node.module.id) { "x" } else { " " };
            println!("  [{}] {}", mark, node.module.name);
        }
    }
    for duplicate in &approval.duplicate_approvals {
        println!("Warning: exam {} approved {} times", duplicate.exam_id, duplicate.grade_ids.len());
    }
}

fn print_mutation(mutation: &GradeMutation) {
    let grade = &mutation.grade;
    println!(
        "Grade {} | exam {} | {} | {}",
        grade.id,
        grade.exam_id,
        grade.score,
        if grade.approved { "approved" } else { "failed" }
    );
    match &mutation.approval {
        Some(approval) => println!(
            "  Approved modules: {} | approved blocks: {}",
            approval.approved_module_ids.len(),
            approval.approved_block_ids.len()
        ),
        None => println!("  Exam no longer exists; approvals not recomputed"),
    }
}

fn format_module_status(status: ModuleStatus) -> &'static str {
    match status {
        ModuleStatus::Approved => "Aprobado",
        ModuleStatus::Enrolled => "Inscripto",
        ModuleStatus::NotEnrolled => "No inscripto",
    }
}

fn format_next_step(step: &NextStep) -> String {
    match step {
        NextStep::Completed { score } => format!("completed with {}", score),
        NextStep::SitFinalSinc => "sit FINAL_SINC".to_string(),
        NextStep::SitFinalVirtual => "sit FINAL_VIRTUAL".to_string(),
        NextStep::ClearModules { modules } => format!("approve {} pending module(s)", modules.len()),
        NextStep::Ungradable => "block has no modules".to_string(),
    }
}
