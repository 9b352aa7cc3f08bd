//! Progression Engine
//!
//! Decides, from a program's structure and a student's grades and
//! enrollments, which modules and blocks are approved, which exams may be
//! sat next, and whether the student has graduated.

#![warn(missing_docs)]

pub mod error;
pub mod config;
pub mod structure;
pub mod approval;
pub mod eligibility;
pub mod graduation;
pub mod evaluation;
pub mod service;

#[cfg(test)]
mod fixtures;

pub use error::{ProgressionError, Result};
pub use config::ProgressionConfig;
pub use structure::{BlockNode, ModuleNode, ProgramStructure, StructureLoader};
pub use approval::{ApprovalResolver, ApprovalState, DuplicateApproval};
pub use eligibility::{
    BlockEnrollmentOptions, EligibilityFilter, EligibilityQuery, EligibilityReport,
    EnrollmentOption, ModuleOption, ModuleStatus, OfferableExam,
};
pub use graduation::{CohortGraduationSummary, GraduationEvaluator, GraduationStatus};
pub use evaluation::{AttemptRecord, BlockEvaluation, BlockEvaluationStatus, NextStep};
pub use service::{CohortReport, GradeInput, GradeMutation, ProgressionService};
