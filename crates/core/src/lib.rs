//! Academia core data models.
//!
//! Programs are split into blocks, blocks into modules, and both modules and
//! blocks own exams. Students are graded on exams and enrolled into cohorts.

#![warn(missing_docs)]

// Core identities
mod id;
mod error;

// Program structure
mod program;
mod exam;

// Student records
mod grade;
mod enrollment;

// Re-exports
pub use id::*;
pub use error::{ModelError, Result};

pub use program::{Program, Block, Module, DEFAULT_PRACTICAL_ATTENDANCE_PCT};
pub use exam::{Exam, ExamTier, ExamOwner, ExamFilter};
pub use grade::{Grade, GradeFilter, PASSING_SCORE, MAX_SCORE};
pub use enrollment::{
    Enrollment, EnrollmentState, EnrollmentFilter, Cohort, CalendarWeek, WeekKind, Student,
};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
