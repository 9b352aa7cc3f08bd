//! Enrollment, cohort and student models.

use serde::{Deserialize, Serialize};
use crate::id::{CohortId, EnrollmentId, ModuleId, ProgramId, StudentId};

/// Enrollment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentState {
    /// Registered, not started
    Inscripto,
    /// Attending
    Activo,
    /// Temporarily paused
    Pausado,
    /// Dropped out
    Baja,
    /// Graduated
    Egresado,
}

impl EnrollmentState {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentState::Inscripto => "INSCRIPTO",
            EnrollmentState::Activo => "ACTIVO",
            EnrollmentState::Pausado => "PAUSADO",
            EnrollmentState::Baja => "BAJA",
            EnrollmentState::Egresado => "EGRESADO",
        }
    }
}

impl std::str::FromStr for EnrollmentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INSCRIPTO" => Ok(EnrollmentState::Inscripto),
            "ACTIVO" => Ok(EnrollmentState::Activo),
            "PAUSADO" => Ok(EnrollmentState::Pausado),
            "BAJA" => Ok(EnrollmentState::Baja),
            "EGRESADO" => Ok(EnrollmentState::Egresado),
            _ => Err(format!("unknown enrollment state: {}", s)),
        }
    }
}

/// A student's registration into a cohort, optionally for one module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    /// Unique identifier
    pub id: EnrollmentId,

    /// Enrolled student
    pub student_id: StudentId,

    /// Cohort enrolled into
    pub cohort_id: CohortId,

    /// Specific module, if the enrollment is per module
    #[serde(default)]
    pub module_id: Option<ModuleId>,

    /// Current state
    pub state: EnrollmentState,
}

impl Enrollment {
    /// Create an active enrollment.
    pub fn new(student_id: StudentId, cohort_id: CohortId, module_id: Option<ModuleId>) -> Self {
        Self {
            id: EnrollmentId::new(),
            student_id,
            cohort_id,
            module_id,
            state: EnrollmentState::Activo,
        }
    }

    /// Set the state.
    pub fn with_state(mut self, state: EnrollmentState) -> Self {
        self.state = state;
        self
    }
}

/// Filter for querying enrollments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrollmentFilter {
    /// Only this student's enrollments
    pub student_id: Option<StudentId>,

    /// Only enrollments into this cohort
    pub cohort_id: Option<CohortId>,

    /// Only enrollments in this state
    pub state: Option<EnrollmentState>,
}

impl EnrollmentFilter {
    /// Whether an enrollment passes this filter.
    pub fn matches(&self, enrollment: &Enrollment) -> bool {
        self.student_id.map_or(true, |id| enrollment.student_id == id)
            && self.cohort_id.map_or(true, |id| enrollment.cohort_id == id)
            && self.state.map_or(true, |state| enrollment.state == state)
    }
}

/// Kind of a calendar week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeekKind {
    /// Regular class week
    Clase,
    /// Partial exams week
    Parcial,
    /// Virtual finals week
    FinalVirtual,
    /// Synchronous finals week
    FinalSinc,
}

/// One week of a cohort calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarWeek {
    /// Position in the calendar, starting at 1
    pub order: u32,

    /// What happens that week
    pub kind: WeekKind,
}

/// A program bound to a calendar run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cohort {
    /// Unique identifier
    pub id: CohortId,

    /// Program taught
    pub program_id: ProgramId,

    /// Unique display name, e.g. "Dev Jr 2025-1"
    pub name: String,

    /// First day of classes
    pub start_date: chrono::NaiveDate,

    /// Week plan
    #[serde(default)]
    pub calendar: Vec<CalendarWeek>,
}

/// A student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    /// Unique identifier
    pub id: StudentId,

    /// Given names
    pub first_name: String,

    /// Family name
    pub last_name: String,

    /// National id number
    pub dni: String,

    /// Contact email
    pub email: String,
}

impl Student {
    /// "Last, First" display form.
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_by_student_and_state() {
        let student = StudentId::new();
        let active = Enrollment::new(student, CohortId::new(), None);
        let paused = Enrollment::new(student, CohortId::new(), None).with_state(EnrollmentState::Pausado);
        let other = Enrollment::new(StudentId::new(), CohortId::new(), None);

        let filter = EnrollmentFilter {
            student_id: Some(student),
            state: Some(EnrollmentState::Activo),
            ..Default::default()
        };
        assert!(filter.matches(&active));
        assert!(!filter.matches(&paused));
        assert!(!filter.matches(&other));
        assert!(EnrollmentFilter::default().matches(&other));
    }

    #[test]
    fn test_state_parses_case_insensitively() {
        assert_eq!("activo".parse::<EnrollmentState>().unwrap(), EnrollmentState::Activo);
        assert!("graduado".parse::<EnrollmentState>().is_err());
    }
}
